use std::path::Path;

use crate::{config::SurgeryConfig, error::Result};

pub mod graph;
pub mod load;
pub mod save;

pub use graph::{Dim, Graph, ValueInfo};

#[derive(Debug, Clone, PartialEq, Default)]
/// A loaded ONNX model: the editable graph plus the model-level metadata
/// that has to be written back unchanged.
pub struct Model {
    pub ir_version: i64,
    pub producer_name: String,
    pub producer_version: String,
    pub domain: String,
    pub model_version: i64,
    pub doc_string: String,
    /// `(domain, version)` pairs the graph's operators are resolved against.
    pub opset_import: Vec<(String, i64)>,
    pub metadata_props: Vec<(String, String)>,
    /// Encoded `FunctionProto`s, written back unchanged.
    pub functions: Vec<Vec<u8>>,
    /// Encoded `TrainingInfoProto`s, written back unchanged.
    pub training_info: Vec<Vec<u8>>,
    /// The computation graph being edited.
    pub graph: Graph,
}

impl Model {
    /// Wraps a graph with the metadata of a recent default-domain model.
    pub fn from_graph(graph: Graph) -> Self {
        Self {
            ir_version: DEFAULT_IR_VERSION,
            producer_name: env!("CARGO_PKG_NAME").to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            opset_import: vec![(String::new(), DEFAULT_OPSET)],
            graph,
            ..Default::default()
        }
    }

    /// Load a model from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_onnx_file(path.as_ref())
    }

    /// Write the model to an ONNX file, running the checks `config` enables.
    pub fn save<P: AsRef<Path>>(&self, path: P, config: &SurgeryConfig) -> Result<()> {
        self.save_onnx_file(path.as_ref(), config)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }
}

pub const DEFAULT_IR_VERSION: i64 = 8;
pub const DEFAULT_OPSET: i64 = 17;
