//! Serializable overview of a model, used for machine-readable inspection.

use serde::Serialize;

use crate::{
    model::{Dim, Model, ValueInfo},
    tensor::ElementKind,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub producer: String,
    pub opsets: Vec<(String, i64)>,
    pub graph: String,
    pub inputs: Vec<TensorSummary>,
    pub outputs: Vec<TensorSummary>,
    pub constants: Vec<ConstantSummary>,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorSummary {
    pub name: String,
    /// `None` when the element type is undeclared or not one this crate models.
    pub kind: Option<ElementKind>,
    pub shape: Option<Vec<Dim>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantSummary {
    pub name: String,
    pub kind: ElementKind,
    pub dims: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: Vec<String>,
}

impl From<&ValueInfo> for TensorSummary {
    fn from(info: &ValueInfo) -> Self {
        TensorSummary {
            name: info.name.clone(),
            kind: ElementKind::from_code(info.elem_type),
            shape: info.shape.clone(),
        }
    }
}

impl Model {
    pub fn summary(&self) -> ModelSummary {
        let graph = &self.graph;
        ModelSummary {
            producer: format!("{} {}", self.producer_name, self.producer_version)
                .trim()
                .to_string(),
            opsets: self.opset_import.clone(),
            graph: graph.name.clone(),
            inputs: graph.inputs.iter().map(TensorSummary::from).collect(),
            outputs: graph.outputs.iter().map(TensorSummary::from).collect(),
            constants: graph
                .constants
                .iter()
                .map(|c| ConstantSummary {
                    name: c.name.clone(),
                    kind: c.kind,
                    dims: c.dims.clone(),
                })
                .collect(),
            nodes: graph
                .nodes
                .iter()
                .map(|n| NodeSummary {
                    name: n.name.clone(),
                    op_type: n.op_type.clone(),
                    inputs: n.inputs.clone(),
                    outputs: n.outputs.clone(),
                    attributes: n.attributes.iter().map(|a| a.name.clone()).collect(),
                })
                .collect(),
        }
    }
}
