//! The graph store: nodes, constants and boundary declarations, with lookups.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SurgeryError},
    node::Node,
    proto,
    tensor::Constant,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// One dimension of a declared shape.
pub enum Dim {
    Value(i64),
    /// A symbolic dimension such as `batch`.
    Param(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default)]
/// A name plus optional tensor type, used for graph inputs, outputs and
/// intermediate shape annotations.
pub struct ValueInfo {
    pub name: String,
    /// `TensorProto.DataType` code, 0 when the declaration carries no type.
    pub elem_type: i32,
    /// `None` when the declaration carries no shape at all.
    pub shape: Option<Vec<Dim>>,
    pub doc_string: String,
    /// The decoded type, kept when `elem_type` and `shape` cannot rebuild it:
    /// sequence, map, optional and sparse types, or tensor types carrying
    /// denotations. Written back in their place; cleared by `set_dims`.
    pub opaque_type: Option<proto::TypeProto>,
}

impl ValueInfo {
    pub fn new(name: impl Into<String>, elem_type: i32, shape: Option<Vec<Dim>>) -> Self {
        Self {
            name: name.into(),
            elem_type,
            shape,
            doc_string: String::new(),
            opaque_type: None,
        }
    }

    /// Replaces the declared dimension list wholesale with concrete values.
    ///
    /// Any type kept verbatim from the source file is discarded, since it
    /// would carry the old dimensions.
    pub fn set_dims(&mut self, dims: &[i64]) {
        self.shape = Some(dims.iter().copied().map(Dim::Value).collect());
        self.opaque_type = None;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// An editable computation graph.
///
/// Edges are implicit: a node consumes a tensor by naming it. Every name a
/// node consumes should be produced by exactly one of another node's
/// outputs, a constant or a declared input; see [`Graph::check_references`].
pub struct Graph {
    pub name: String,
    /// Nodes in topological order.
    pub nodes: Vec<Node>,
    /// Initializers, unordered.
    pub constants: Vec<Constant>,
    /// Sparse initializers. They are never rewritten, but they produce names
    /// like any other constant and are dropped with them.
    pub sparse_constants: Vec<proto::SparseTensorProto>,
    pub inputs: Vec<ValueInfo>,
    /// Declared outputs, ordered; a well-formed top-level graph has at least one.
    pub outputs: Vec<ValueInfo>,
    /// Advisory shape annotations for intermediate tensors.
    pub value_infos: Vec<ValueInfo>,
    /// Quantization parameters per tensor, carried through unchanged.
    pub quantization_annotations: Vec<proto::TensorAnnotation>,
    pub doc_string: String,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First node named `name`, in graph order.
    pub fn find_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn find_node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// All nodes running `op_type`, in graph order.
    ///
    /// The result borrows the graph; collect the names first if the node
    /// sequence is going to be edited.
    pub fn find_nodes_by_op_type(&self, op_type: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|node| node.op_type == op_type)
            .collect()
    }

    pub fn find_constant(&self, name: &str) -> Option<&Constant> {
        self.constants.iter().find(|constant| constant.name == name)
    }

    pub fn find_constant_mut(&mut self, name: &str) -> Option<&mut Constant> {
        self.constants.iter_mut().find(|constant| constant.name == name)
    }

    pub fn find_input(&self, name: &str) -> Option<&ValueInfo> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn find_input_mut(&mut self, name: &str) -> Option<&mut ValueInfo> {
        self.inputs.iter_mut().find(|input| input.name == name)
    }

    pub fn find_value_info(&self, name: &str) -> Option<&ValueInfo> {
        self.value_infos.iter().find(|info| info.name == name)
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|output| output.name == name)
    }

    /// Names produced inside this graph: node outputs, constants and inputs.
    pub fn defined_names(&self) -> HashSet<&str> {
        self.nodes
            .iter()
            .flat_map(|node| node.outputs.iter())
            .chain(self.constants.iter().map(|c| &c.name))
            .chain(self.inputs.iter().map(|i| &i.name))
            .map(String::as_str)
            .chain(self.sparse_constants.iter().map(proto::SparseTensorProto::name))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Names this graph reads from an enclosing scope.
    ///
    /// Only meaningful for subgraphs held by attributes; for a top-level graph
    /// a non-empty result means dangling references.
    pub fn outer_references(&self) -> BTreeSet<String> {
        let local = self.defined_names();
        let mut refs = BTreeSet::new();
        for node in &self.nodes {
            for name in node.consumed_names() {
                if !local.contains(name.as_str()) {
                    refs.insert(name);
                }
            }
        }
        for output in &self.outputs {
            if !local.contains(output.name.as_str()) {
                refs.insert(output.name.clone());
            }
        }
        refs
    }

    /// Renames reads of the outer-scope name `from` to `to`.
    ///
    /// Stops at any scope that defines `from` itself, since that definition
    /// shadows the outer one.
    pub fn rename_outer_reference(&mut self, from: &str, to: &str) -> usize {
        if self.defined_names().contains(from) {
            return 0;
        }
        let mut count = 0;
        for node in &mut self.nodes {
            count += node.rename_input(from, to);
        }
        for output in self.outputs.iter_mut().filter(|o| o.name == from) {
            output.name = to.to_string();
            count += 1;
        }
        count
    }

    /// True if renaming the outer-scope read of `from` to `to` would bind it to
    /// a `to` defined inside this graph or one of its nested subgraphs.
    pub fn capture_would_shadow(&self, from: &str, to: &str) -> bool {
        let local = self.defined_names();
        if local.contains(from) {
            return false;
        }
        if local.contains(to) {
            return self.outer_references().contains(from);
        }
        self.nodes
            .iter()
            .flat_map(Node::subgraphs)
            .any(|g| g.capture_would_shadow(from, to))
    }

    /// Removes the dense and sparse constants named in `names`, returning how
    /// many were removed.
    pub(crate) fn remove_constants(&mut self, names: &BTreeSet<String>) -> usize {
        self.retain_constants(|name| !names.contains(name))
    }

    pub(crate) fn retain_constants(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.constants.len() + self.sparse_constants.len();
        self.constants.retain(|c| keep(&c.name));
        self.sparse_constants.retain(|s| keep(s.name()));
        before - self.constants.len() - self.sparse_constants.len()
    }

    pub(crate) fn remove_inputs(&mut self, names: &BTreeSet<String>) -> usize {
        let before = self.inputs.len();
        self.inputs.retain(|i| !names.contains(&i.name));
        before - self.inputs.len()
    }

    pub(crate) fn remove_value_infos(&mut self, names: &BTreeSet<String>) -> usize {
        let before = self.value_infos.len();
        self.value_infos.retain(|v| !names.contains(&v.name));
        before - self.value_infos.len()
    }

    /// Verifies that every consumed name resolves to exactly one producer and
    /// every declared output is produced.
    ///
    /// A constant and a declared input sharing a name count as one producer:
    /// older IR versions list every initializer among the graph inputs.
    /// Subgraphs are checked recursively with the enclosing names in scope.
    pub fn check_references(&self) -> Result<()> {
        self.check_references_in_scope(&HashSet::new())
    }

    fn check_references_in_scope(&self, outer: &HashSet<&str>) -> Result<()> {
        let mut node_producers: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            for output in node.outputs.iter().filter(|o| !o.is_empty()) {
                *node_producers.entry(output.as_str()).or_default() += 1;
            }
        }
        let boundary: HashSet<&str> = self
            .constants
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.sparse_constants.iter().map(proto::SparseTensorProto::name))
            .chain(self.inputs.iter().map(|i| i.name.as_str()))
            .collect();

        let resolve = |node: &str, name: &str| -> Result<()> {
            let from_nodes = node_producers.get(name).copied().unwrap_or(0);
            let from_boundary = usize::from(boundary.contains(name));
            match from_nodes + from_boundary {
                0 if outer.contains(name) => Ok(()),
                0 => Err(SurgeryError::DanglingReference {
                    node: node.to_string(),
                    name: name.to_string(),
                }),
                1 => Ok(()),
                _ => Err(SurgeryError::AmbiguousReference {
                    node: node.to_string(),
                    name: name.to_string(),
                }),
            }
        };

        for node in &self.nodes {
            for input in node.inputs.iter().filter(|i| !i.is_empty()) {
                resolve(&node.name, input)?;
            }
        }
        for output in &self.outputs {
            resolve("<graph output>", &output.name)?;
        }

        let mut scope: HashSet<&str> = outer.clone();
        scope.extend(self.defined_names());
        for node in &self.nodes {
            for g in node.subgraphs() {
                g.check_references_in_scope(&scope)?;
            }
        }
        Ok(())
    }
}
