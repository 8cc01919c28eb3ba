//! Node representation and the factory used to splice new nodes into a graph.
//! A `Node` models a single operator instance; edges are implicit, by tensor name.
use std::collections::BTreeSet;

use crate::{error::Result, model::Graph};

/// Kind-tagged operator attributes.
pub mod attribute;

pub use attribute::{Attribute, AttributeKind, AttributeValue};

#[derive(Debug, Clone, PartialEq, Default)]
/// A single operator instance in the graph.
///
/// Nodes connect to each other only through tensor names: an entry of
/// `inputs` refers to an output of another node, a constant or a declared
/// graph input. An empty input name marks an omitted optional input.
pub struct Node {
    /// Lookup name; unique by convention, not enforced.
    pub name: String,
    pub op_type: String,
    pub domain: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub doc_string: String,
}

impl Node {
    /// Construct a new node.
    ///
    /// - `op_type`: Operator this node performs, e.g. `"Flatten"`.
    /// - `inputs`: Tensor names consumed, in operator order.
    /// - `outputs`: Tensor names produced, in operator order.
    /// - `name`: Lookup name of the node.
    pub fn new<I, O>(
        op_type: impl Into<String>,
        inputs: I,
        outputs: O,
        name: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// First attribute literally named `name`.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Overwrites every attribute named `name`, dispatching on its stored kind.
    ///
    /// Returns `Ok(false)` if the node has no such attribute. A kind the
    /// value cannot be written into is reported as an error and leaves every
    /// attribute untouched.
    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<bool> {
        let found = attribute::overwrite(&mut self.attributes, name, &value)?;
        if found {
            tracing::debug!(node = %self.name, attribute = name, "attribute overwritten");
        }
        Ok(found)
    }

    /// Subgraphs held by graph-valued attributes (`If` branches, `Loop` bodies).
    pub fn subgraphs(&self) -> impl Iterator<Item = &Graph> {
        self.attributes.iter().filter_map(|attr| match &attr.value {
            AttributeValue::Graph(g) => Some(g.as_ref()),
            _ => None,
        })
    }

    pub fn subgraphs_mut(&mut self) -> impl Iterator<Item = &mut Graph> {
        self.attributes.iter_mut().filter_map(|attr| match &mut attr.value {
            AttributeValue::Graph(g) => Some(g.as_mut()),
            _ => None,
        })
    }

    /// Outer-scope tensor names read implicitly by this node's subgraphs.
    pub fn captures(&self) -> BTreeSet<String> {
        self.subgraphs()
            .flat_map(|g| g.outer_references())
            .collect()
    }

    /// Every tensor name this node consumes, explicit inputs first.
    pub fn consumed_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inputs
            .iter()
            .filter(|name| !name.is_empty())
            .cloned()
            .collect();
        names.extend(self.captures());
        names
    }

    /// True if `name` is an input of this node or captured by one of its subgraphs.
    pub fn references(&self, name: &str) -> bool {
        self.inputs.iter().any(|input| input == name)
            || self.subgraphs().any(|g| g.outer_references().contains(name))
    }

    /// Rewrites every consumption of `from` into `to`, including captures.
    ///
    /// Returns the number of rewritten references.
    pub fn rename_input(&mut self, from: &str, to: &str) -> usize {
        let mut count = 0;
        for input in self.inputs.iter_mut().filter(|input| input.as_str() == from) {
            *input = to.to_string();
            count += 1;
        }
        for g in self.subgraphs_mut() {
            count += g.rename_outer_reference(from, to);
        }
        count
    }
}
