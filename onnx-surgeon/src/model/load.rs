use std::path::Path;

use prost::Message;

use crate::{
    error::{Result, SurgeryError},
    model::{Dim, Graph, Model, ValueInfo},
    node::{Attribute, AttributeValue, Node},
    proto::{self, attribute_type, data_location, tensor_shape_proto::dimension, type_proto},
    tensor::{Constant, ElementKind, Payload},
};

impl Model {
    /// Decode a model from serialized `ModelProto` bytes.
    ///
    /// Every constant is validated on the way in, so a graph that loads here
    /// has payloads consistent with their recorded shapes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let proto = proto::ModelProto::decode(bytes)?;
        Model::try_from(proto)
    }

    /// Reads and decodes the ONNX file at `path`.
    pub(super) fn load_onnx_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let model = Model::from_bytes(&bytes)?;
        tracing::info!(
            path = %path.display(),
            nodes = model.graph.nodes.len(),
            constants = model.graph.constants.len(),
            "model loaded"
        );
        Ok(model)
    }
}

impl TryFrom<proto::ModelProto> for Model {
    type Error = SurgeryError;

    fn try_from(model: proto::ModelProto) -> Result<Self> {
        let graph = model
            .graph
            .ok_or_else(|| SurgeryError::precondition("model has no graph"))?;
        Ok(Model {
            ir_version: model.ir_version,
            producer_name: model.producer_name,
            producer_version: model.producer_version,
            domain: model.domain,
            model_version: model.model_version,
            doc_string: model.doc_string,
            opset_import: model
                .opset_import
                .into_iter()
                .map(|opset| (opset.domain, opset.version))
                .collect(),
            metadata_props: model
                .metadata_props
                .into_iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
            functions: model.functions,
            training_info: model.training_info,
            graph: Graph::try_from(graph)?,
        })
    }
}

impl TryFrom<proto::GraphProto> for Graph {
    type Error = SurgeryError;

    fn try_from(graph: proto::GraphProto) -> Result<Self> {
        Ok(Graph {
            name: graph.name,
            nodes: graph
                .node
                .into_iter()
                .map(Node::try_from)
                .collect::<Result<_>>()?,
            constants: graph
                .initializer
                .into_iter()
                .map(Constant::try_from)
                .collect::<Result<_>>()?,
            inputs: graph.input.into_iter().map(ValueInfo::from).collect(),
            outputs: graph.output.into_iter().map(ValueInfo::from).collect(),
            value_infos: graph.value_info.into_iter().map(ValueInfo::from).collect(),
            sparse_constants: graph.sparse_initializer,
            quantization_annotations: graph.quantization_annotation,
            doc_string: graph.doc_string,
        })
    }
}

impl TryFrom<proto::NodeProto> for Node {
    type Error = SurgeryError;

    fn try_from(node: proto::NodeProto) -> Result<Self> {
        Ok(Node {
            name: node.name,
            op_type: node.op_type,
            domain: node.domain,
            inputs: node.input,
            outputs: node.output,
            attributes: node
                .attribute
                .into_iter()
                .map(Attribute::try_from)
                .collect::<Result<_>>()?,
            doc_string: node.doc_string,
        })
    }
}

impl TryFrom<proto::AttributeProto> for Attribute {
    type Error = SurgeryError;

    fn try_from(attr: proto::AttributeProto) -> Result<Self> {
        // References into an enclosing function body carry no value of their own.
        if !attr.ref_attr_name.is_empty() {
            return Ok(unsupported(attr));
        }
        let value = match attr.r#type {
            attribute_type::FLOAT => AttributeValue::Float(attr.f),
            attribute_type::INT => AttributeValue::Int(attr.i),
            attribute_type::STRING => AttributeValue::Bytes(attr.s),
            attribute_type::TENSOR => {
                let tensor = attr.t.ok_or_else(|| {
                    SurgeryError::precondition(format!(
                        "tensor attribute `{}` has no tensor",
                        attr.name
                    ))
                })?;
                AttributeValue::Tensor(Box::new(Constant::try_from(tensor)?))
            }
            attribute_type::GRAPH => {
                let graph = attr.g.ok_or_else(|| {
                    SurgeryError::precondition(format!(
                        "graph attribute `{}` has no graph",
                        attr.name
                    ))
                })?;
                AttributeValue::Graph(Box::new(Graph::try_from(graph)?))
            }
            attribute_type::FLOATS => AttributeValue::Floats(attr.floats),
            attribute_type::INTS => AttributeValue::Ints(attr.ints),
            attribute_type::STRINGS => AttributeValue::Strings(attr.strings),
            _ => return Ok(unsupported(attr)),
        };
        Ok(Attribute {
            name: attr.name,
            value,
            doc_string: attr.doc_string,
        })
    }
}

fn unsupported(attr: proto::AttributeProto) -> Attribute {
    Attribute {
        name: attr.name.clone(),
        doc_string: attr.doc_string.clone(),
        value: AttributeValue::Unsupported(Box::new(attr)),
    }
}

impl TryFrom<proto::TensorProto> for Constant {
    type Error = SurgeryError;

    fn try_from(tensor: proto::TensorProto) -> Result<Self> {
        let proto::TensorProto {
            dims,
            data_type,
            float_data,
            int32_data,
            string_data,
            int64_data,
            name,
            doc_string,
            raw_data,
            external_data,
            data_location: location,
            double_data,
            uint64_data,
        } = tensor;

        if location == data_location::EXTERNAL || !external_data.is_empty() {
            return Err(SurgeryError::UnsupportedKind(format!(
                "tensor `{name}` keeps its data in an external file"
            )));
        }
        let kind = ElementKind::from_code(data_type).ok_or_else(|| {
            SurgeryError::UnsupportedKind(format!("tensor `{name}` has data type {data_type}"))
        })?;

        let mut populated = Vec::new();
        if !raw_data.is_empty() {
            populated.push(Payload::Raw(raw_data));
        }
        if !float_data.is_empty() {
            populated.push(Payload::Floats(float_data));
        }
        if !int32_data.is_empty() {
            populated.push(Payload::Int32s(int32_data));
        }
        if !string_data.is_empty() {
            populated.push(Payload::Strings(string_data));
        }
        if !int64_data.is_empty() {
            populated.push(Payload::Int64s(int64_data));
        }
        if !double_data.is_empty() {
            populated.push(Payload::Doubles(double_data));
        }
        if !uint64_data.is_empty() {
            populated.push(Payload::UInt64s(uint64_data));
        }
        let payload = populated.pop().unwrap_or(Payload::Raw(Vec::new()));
        if !populated.is_empty() {
            return Err(SurgeryError::precondition(format!(
                "tensor `{name}` populates more than one data field"
            )));
        }

        let constant = Constant {
            name,
            kind,
            dims,
            payload,
            doc_string,
        };
        constant.validate()?;
        Ok(constant)
    }
}

impl From<proto::ValueInfoProto> for ValueInfo {
    fn from(info: proto::ValueInfoProto) -> Self {
        let mut value_info = ValueInfo::new(info.name, 0, None);
        value_info.doc_string = info.doc_string;
        let Some(r#type) = info.r#type else {
            return value_info;
        };
        if let Some(type_proto::Value::TensorType(tensor)) = &r#type.value {
            value_info.elem_type = tensor.elem_type;
            value_info.shape = tensor
                .shape
                .as_ref()
                .map(|shape| shape.dim.iter().cloned().map(Dim::from).collect());
            if !has_denotation(&r#type) {
                return value_info;
            }
        }
        // Non-tensor types, and tensor types carrying denotations, are
        // written back exactly as read.
        value_info.opaque_type = Some(r#type);
        value_info
    }
}

fn has_denotation(r#type: &proto::TypeProto) -> bool {
    let dims_denoted = match &r#type.value {
        Some(type_proto::Value::TensorType(tensor)) => tensor
            .shape
            .iter()
            .flat_map(|shape| &shape.dim)
            .any(|dim| !dim.denotation.is_empty()),
        _ => false,
    };
    !r#type.denotation.is_empty() || dims_denoted
}

impl From<proto::tensor_shape_proto::Dimension> for Dim {
    fn from(dim: proto::tensor_shape_proto::Dimension) -> Self {
        match dim.value {
            Some(dimension::Value::DimValue(v)) => Dim::Value(v),
            Some(dimension::Value::DimParam(p)) => Dim::Param(p),
            None => Dim::Unknown,
        }
    }
}
