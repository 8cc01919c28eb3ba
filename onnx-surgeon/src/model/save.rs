use std::path::Path;

use prost::Message;

use crate::{
    config::SurgeryConfig,
    error::{Result, SurgeryError},
    model::{Dim, Graph, Model, ValueInfo},
    node::{Attribute, AttributeValue, Node},
    proto::{self, tensor_shape_proto::dimension, type_proto},
    tensor::{Constant, Payload},
};

impl Model {
    /// Serialize the model to `ModelProto` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        proto::ModelProto::from(self).encode_to_vec()
    }

    /// Parses the serialized model with tract's ONNX frontend.
    ///
    /// Passing means every operator resolves against the declared opsets and
    /// the graph wiring is accepted by a real consumer of the format.
    pub fn verify_loadable(&self) -> Result<()> {
        use tract_onnx::prelude::*;

        let bytes = self.to_bytes();
        tract_onnx::onnx()
            .model_for_read(&mut bytes.as_slice())
            .map_err(|e| SurgeryError::Unloadable(format!("{e:#}")))?;
        Ok(())
    }

    pub(super) fn save_onnx_file(&self, path: &Path, config: &SurgeryConfig) -> Result<()> {
        if config.check_references {
            self.graph.check_references()?;
        }
        if config.verify_on_save {
            self.verify_loadable()?;
        }
        let bytes = self.to_bytes();
        std::fs::write(path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "model saved");
        Ok(())
    }
}

impl From<&Model> for proto::ModelProto {
    fn from(model: &Model) -> Self {
        proto::ModelProto {
            ir_version: model.ir_version,
            opset_import: model
                .opset_import
                .iter()
                .map(|(domain, version)| proto::OperatorSetIdProto {
                    domain: domain.clone(),
                    version: *version,
                })
                .collect(),
            producer_name: model.producer_name.clone(),
            producer_version: model.producer_version.clone(),
            domain: model.domain.clone(),
            model_version: model.model_version,
            doc_string: model.doc_string.clone(),
            graph: Some(proto::GraphProto::from(&model.graph)),
            metadata_props: model
                .metadata_props
                .iter()
                .map(|(key, value)| proto::StringStringEntryProto {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            training_info: model.training_info.clone(),
            functions: model.functions.clone(),
        }
    }
}

impl From<&Graph> for proto::GraphProto {
    fn from(graph: &Graph) -> Self {
        proto::GraphProto {
            node: graph.nodes.iter().map(proto::NodeProto::from).collect(),
            name: graph.name.clone(),
            initializer: graph.constants.iter().map(proto::TensorProto::from).collect(),
            doc_string: graph.doc_string.clone(),
            input: graph.inputs.iter().map(proto::ValueInfoProto::from).collect(),
            output: graph.outputs.iter().map(proto::ValueInfoProto::from).collect(),
            value_info: graph
                .value_infos
                .iter()
                .map(proto::ValueInfoProto::from)
                .collect(),
            quantization_annotation: graph.quantization_annotations.clone(),
            sparse_initializer: graph.sparse_constants.clone(),
        }
    }
}

impl From<&Node> for proto::NodeProto {
    fn from(node: &Node) -> Self {
        proto::NodeProto {
            input: node.inputs.clone(),
            output: node.outputs.clone(),
            name: node.name.clone(),
            op_type: node.op_type.clone(),
            domain: node.domain.clone(),
            attribute: node.attributes.iter().map(proto::AttributeProto::from).collect(),
            doc_string: node.doc_string.clone(),
        }
    }
}

impl From<&Attribute> for proto::AttributeProto {
    fn from(attr: &Attribute) -> Self {
        let mut out = proto::AttributeProto {
            name: attr.name.clone(),
            doc_string: attr.doc_string.clone(),
            r#type: attr.kind().code(),
            ..Default::default()
        };
        match &attr.value {
            AttributeValue::Float(f) => out.f = *f,
            AttributeValue::Int(i) => out.i = *i,
            AttributeValue::Bytes(s) => out.s = s.clone(),
            AttributeValue::Tensor(t) => out.t = Some(proto::TensorProto::from(t.as_ref())),
            AttributeValue::Graph(g) => out.g = Some(proto::GraphProto::from(g.as_ref())),
            AttributeValue::Floats(v) => out.floats = v.clone(),
            AttributeValue::Ints(v) => out.ints = v.clone(),
            AttributeValue::Strings(v) => out.strings = v.clone(),
            AttributeValue::Unsupported(raw) => return (**raw).clone(),
        }
        out
    }
}

impl From<&Constant> for proto::TensorProto {
    fn from(constant: &Constant) -> Self {
        let mut out = proto::TensorProto {
            dims: constant.dims.clone(),
            data_type: constant.kind.code(),
            name: constant.name.clone(),
            doc_string: constant.doc_string.clone(),
            ..Default::default()
        };
        match &constant.payload {
            Payload::Raw(bytes) => out.raw_data = bytes.clone(),
            Payload::Floats(v) => out.float_data = v.clone(),
            Payload::Int32s(v) => out.int32_data = v.clone(),
            Payload::Int64s(v) => out.int64_data = v.clone(),
            Payload::Doubles(v) => out.double_data = v.clone(),
            Payload::UInt64s(v) => out.uint64_data = v.clone(),
            Payload::Strings(v) => out.string_data = v.clone(),
        }
        out
    }
}

impl From<&ValueInfo> for proto::ValueInfoProto {
    fn from(info: &ValueInfo) -> Self {
        // A bare name decodes with no type at all; keep it that way.
        let tensor_type = (info.elem_type != 0 || info.shape.is_some()).then(|| proto::TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: info.elem_type,
                shape: info.shape.as_ref().map(|dims| proto::TensorShapeProto {
                    dim: dims.iter().map(proto::tensor_shape_proto::Dimension::from).collect(),
                }),
            })),
            denotation: String::new(),
        });
        let r#type = info.opaque_type.clone().or(tensor_type);
        proto::ValueInfoProto {
            name: info.name.clone(),
            r#type,
            doc_string: info.doc_string.clone(),
        }
    }
}

impl From<&Dim> for proto::tensor_shape_proto::Dimension {
    fn from(dim: &Dim) -> Self {
        let value = match dim {
            Dim::Value(v) => Some(dimension::Value::DimValue(*v)),
            Dim::Param(p) => Some(dimension::Value::DimParam(p.clone())),
            Dim::Unknown => None,
        };
        proto::tensor_shape_proto::Dimension {
            value,
            denotation: String::new(),
        }
    }
}
