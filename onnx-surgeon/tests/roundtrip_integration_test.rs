use onnx_surgeon::{
    model::{test::GraphBuilder, Dim, ValueInfo},
    proto::{self, data_type},
    tensor::Payload,
    AttributeValue, Constant, ElementKind, Model, SurgeryConfig, SurgeryError,
};
use prost::Message;

/// Minimal `FunctionProto` encoder; the library carries these as opaque bytes.
#[derive(Clone, PartialEq, Message)]
struct FunctionProto {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(string, repeated, tag = "4")]
    input: Vec<String>,
    #[prost(string, repeated, tag = "5")]
    output: Vec<String>,
    #[prost(message, repeated, tag = "7")]
    node: Vec<proto::NodeProto>,
    #[prost(string, tag = "10")]
    domain: String,
}

/// `TypeProto.Sequence`.
#[derive(Clone, PartialEq, Message)]
struct SequenceType {
    #[prost(message, optional, tag = "1")]
    elem_type: Option<proto::TypeProto>,
}

fn conditional_model() -> Model {
    let mut then_branch = GraphBuilder::new("then");
    then_branch.node("Relu", ["h"], ["then_out"], "then_relu");
    then_branch.output("then_out");

    let mut b = GraphBuilder::new("conditional");
    b.input("x", vec![1, 4]);
    b.input("cond", vec![]);
    b.constant(Constant {
        name: "indices".to_string(),
        kind: ElementKind::Int64,
        dims: vec![2],
        payload: Payload::Int64s(vec![0, 3]),
        doc_string: "gather positions".to_string(),
    });
    b.node("Sigmoid", ["x"], ["h"], "sigmoid");
    b.node_with(
        "If",
        ["cond"],
        ["branch"],
        "if",
        ("then_branch", AttributeValue::Graph(Box::new(then_branch.build()))),
    );
    b.node_with(
        "Gather",
        ["branch", "indices"],
        ["y"],
        "gather",
        ("axis", AttributeValue::Int(1)),
    );
    b.output("y");
    let mut model = b.build_model();
    model.doc_string = "fixture".to_string();
    model.opset_import.push(("com.microsoft".to_string(), 1));
    model
}

#[test]
fn test_bytes_round_trip_is_lossless() {
    let model = conditional_model();
    let decoded = Model::from_bytes(&model.to_bytes()).unwrap();
    assert_eq!(decoded, model);
}

#[test]
fn test_file_round_trip_through_tempdir() {
    let model = conditional_model();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conditional.onnx");

    model.save(&path, &SurgeryConfig::default()).unwrap();
    let loaded = Model::load(&path).unwrap();
    assert_eq!(loaded, model);
    assert_eq!(
        loaded.graph.find_constant("indices").unwrap().payload,
        Payload::Int64s(vec![0, 3])
    );
}

#[test]
fn test_unmodelled_attribute_survives_round_trip() {
    let mut model = conditional_model();
    let raw = proto::AttributeProto {
        name: "branches".to_string(),
        r#type: proto::attribute_type::GRAPHS,
        graphs: vec![proto::GraphProto {
            name: "alt".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };
    model.graph.find_node_mut("gather").unwrap().attributes.push(
        onnx_surgeon::Attribute::new("branches", AttributeValue::Unsupported(Box::new(raw.clone()))),
    );

    let bytes = model.to_bytes();
    let proto = proto::ModelProto::decode(bytes.as_slice()).unwrap();
    let gather = &proto.graph.unwrap().node[2];
    assert_eq!(gather.attribute[1], raw);
    assert_eq!(Model::from_bytes(&bytes).unwrap(), model);
}

#[test]
fn test_symbolic_dimensions_survive_round_trip() {
    let mut model = conditional_model();
    model.graph.inputs[0].shape = Some(vec![Dim::Param("batch".to_string()), Dim::Unknown]);
    let decoded = Model::from_bytes(&model.to_bytes()).unwrap();
    assert_eq!(
        decoded.graph.inputs[0].shape,
        Some(vec![Dim::Param("batch".to_string()), Dim::Unknown])
    );
}

#[test]
fn test_garbage_bytes_fail_to_decode() {
    assert!(matches!(
        Model::from_bytes(&[0xFF, 0xFF, 0xFF]),
        Err(SurgeryError::Decode(_))
    ));
}

#[test]
fn test_unknown_element_type_is_unsupported() {
    let mut proto = proto::ModelProto::from(&conditional_model());
    if let Some(graph) = proto.graph.as_mut() {
        graph.initializer[0].data_type = 42;
    }
    assert!(matches!(
        Model::from_bytes(&proto.encode_to_vec()),
        Err(SurgeryError::UnsupportedKind(_))
    ));
}

#[test]
fn test_tract_accepts_saved_model() {
    let mut b = GraphBuilder::new("mlp");
    b.input("x", vec![1, 4]);
    b.constant_f32("w", vec![4, 2], vec![0.25; 8]);
    b.node("MatMul", ["x", "w"], ["h"], "matmul");
    b.node("Relu", ["h"], ["y"], "relu");
    let mut model = b.build_model();
    model.graph.outputs.push(ValueInfo::new(
        "y",
        data_type::FLOAT,
        Some(vec![Dim::Value(1), Dim::Value(2)]),
    ));

    model.verify_loadable().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mlp.onnx");
    model
        .save(&path, &SurgeryConfig::default().with_verify(true))
        .unwrap();
    assert!(path.exists());
}

#[test]
fn test_local_functions_and_sparse_initializers_survive_round_trip() {
    let function = FunctionProto {
        name: "Swish".to_string(),
        input: vec!["a".to_string()],
        output: vec!["b".to_string()],
        node: vec![proto::NodeProto {
            op_type: "Sigmoid".to_string(),
            input: vec!["a".to_string()],
            output: vec!["b".to_string()],
            ..Default::default()
        }],
        domain: "local".to_string(),
    };
    let sparse = proto::SparseTensorProto {
        values: Some(proto::TensorProto {
            name: "mask".to_string(),
            dims: vec![1],
            data_type: data_type::FLOAT,
            float_data: vec![1.0],
            ..Default::default()
        }),
        indices: Some(proto::TensorProto {
            name: "mask_indices".to_string(),
            dims: vec![1],
            data_type: data_type::INT64,
            int64_data: vec![2],
            ..Default::default()
        }),
        dims: vec![4],
    };
    let annotation = proto::TensorAnnotation {
        tensor_name: "x".to_string(),
        quant_parameter_tensor_names: vec![proto::StringStringEntryProto {
            key: "SCALE_TENSOR".to_string(),
            value: "x_scale".to_string(),
        }],
    };

    let mut source = proto::ModelProto::from(&conditional_model());
    source.functions.push(function.encode_to_vec());
    source.training_info.push(b"\x0a\x00".to_vec());
    if let Some(graph) = source.graph.as_mut() {
        graph.sparse_initializer.push(sparse.clone());
        graph.quantization_annotation.push(annotation.clone());
        graph.node.push(proto::NodeProto {
            op_type: "Mul".to_string(),
            name: "masked".to_string(),
            domain: "local".to_string(),
            input: vec!["x".to_string(), "mask".to_string()],
            output: vec!["masked_x".to_string()],
            ..Default::default()
        });
    }

    let model = Model::from_bytes(&source.encode_to_vec()).unwrap();
    model.graph.check_references().unwrap();
    assert_eq!(model.functions.len(), 1);

    let written = proto::ModelProto::decode(model.to_bytes().as_slice()).unwrap();
    assert_eq!(written.functions.len(), 1);
    assert_eq!(FunctionProto::decode(written.functions[0].as_slice()).unwrap(), function);
    assert_eq!(written.training_info, source.training_info);
    let graph = written.graph.unwrap();
    assert_eq!(graph.sparse_initializer, vec![sparse]);
    assert_eq!(graph.quantization_annotation, vec![annotation]);
}

#[test]
fn test_pruning_drops_unreferenced_sparse_initializer() {
    let mut model = conditional_model();
    model.graph.sparse_constants.push(proto::SparseTensorProto {
        values: Some(proto::TensorProto {
            name: "unused_mask".to_string(),
            dims: vec![0],
            data_type: data_type::FLOAT,
            ..Default::default()
        }),
        ..Default::default()
    });
    let report = model.graph.prune_to_reachable_from("gather").unwrap();
    assert_eq!(report.removed_constants, 1);
    assert!(model.graph.sparse_constants.is_empty());
}

#[test]
fn test_non_tensor_types_survive_round_trip() {
    let float_tensor = proto::TypeProto {
        value: Some(proto::type_proto::Value::TensorType(proto::type_proto::Tensor {
            elem_type: data_type::FLOAT,
            shape: None,
        })),
        denotation: String::new(),
    };
    let sequence = proto::TypeProto {
        value: Some(proto::type_proto::Value::SequenceType(
            SequenceType {
                elem_type: Some(float_tensor),
            }
            .encode_to_vec(),
        )),
        denotation: String::new(),
    };
    let denoted_image = proto::TypeProto {
        value: Some(proto::type_proto::Value::TensorType(proto::type_proto::Tensor {
            elem_type: data_type::UINT8,
            shape: Some(proto::TensorShapeProto {
                dim: vec![proto::tensor_shape_proto::Dimension {
                    value: Some(proto::tensor_shape_proto::dimension::Value::DimValue(3)),
                    denotation: "DATA_CHANNEL".to_string(),
                }],
            }),
        })),
        denotation: "IMAGE".to_string(),
    };

    let mut source = proto::ModelProto::from(&conditional_model());
    if let Some(graph) = source.graph.as_mut() {
        graph.input.push(proto::ValueInfoProto {
            name: "frames".to_string(),
            r#type: Some(sequence.clone()),
            doc_string: String::new(),
        });
        graph.input.push(proto::ValueInfoProto {
            name: "image".to_string(),
            r#type: Some(denoted_image.clone()),
            doc_string: String::new(),
        });
    }

    let model = Model::from_bytes(&source.encode_to_vec()).unwrap();
    let frames = model.graph.find_input("frames").unwrap();
    assert_eq!(frames.opaque_type.as_ref(), Some(&sequence));
    let image = model.graph.find_input("image").unwrap();
    assert_eq!(image.elem_type, data_type::UINT8);
    assert_eq!(image.shape, Some(vec![Dim::Value(3)]));

    let written = proto::ModelProto::decode(model.to_bytes().as_slice()).unwrap();
    let inputs = written.graph.unwrap().input;
    let types: Vec<_> = inputs
        .iter()
        .filter(|i| i.name == "frames" || i.name == "image")
        .map(|i| i.r#type.clone())
        .collect();
    assert_eq!(types, vec![Some(sequence), Some(denoted_image)]);
}
