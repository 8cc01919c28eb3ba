//! Producer and consumer maps over a graph's tensor names.
//!
//! A [`NameIndex`] is a snapshot: build it at the start of an edit and drop it
//! before the graph changes shape.

use std::collections::{BTreeSet, HashMap};

use crate::model::Graph;

/// Where a tensor name is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Producer {
    /// Output of the node at this index in `Graph::nodes`.
    Node(usize),
    /// A dense or sparse initializer.
    Constant,
    /// A declared graph input.
    Input,
}

#[derive(Debug, Default)]
pub struct NameIndex {
    producers: HashMap<String, Vec<Producer>>,
    consumers: HashMap<String, Vec<usize>>,
}

impl NameIndex {
    pub fn build(graph: &Graph) -> Self {
        let mut index = NameIndex::default();
        for (idx, node) in graph.nodes.iter().enumerate() {
            for output in node.outputs.iter().filter(|o| !o.is_empty()) {
                index.add_producer(output, Producer::Node(idx));
            }
            // A node listing the same name twice is still one consumer.
            let consumed: BTreeSet<String> = node.consumed_names().into_iter().collect();
            for name in consumed {
                index.consumers.entry(name).or_default().push(idx);
            }
        }
        for constant in &graph.constants {
            index.add_producer(&constant.name, Producer::Constant);
        }
        for sparse in &graph.sparse_constants {
            index.add_producer(sparse.name(), Producer::Constant);
        }
        for input in &graph.inputs {
            index.add_producer(&input.name, Producer::Input);
        }
        index
    }

    fn add_producer(&mut self, name: &str, producer: Producer) {
        self.producers
            .entry(name.to_string())
            .or_default()
            .push(producer);
    }

    pub fn producers_of(&self, name: &str) -> &[Producer] {
        self.producers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indices of the nodes that output `name`.
    pub fn producing_nodes<'a>(&'a self, name: &str) -> impl Iterator<Item = usize> + 'a {
        self.producers_of(name).iter().filter_map(|p| match p {
            Producer::Node(idx) => Some(*idx),
            _ => None,
        })
    }

    /// Indices of the nodes that consume `name`, explicitly or via a subgraph
    /// capture, in graph order.
    pub fn consumers_of(&self, name: &str) -> &[usize] {
        self.consumers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.producers_of(name).contains(&Producer::Constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::test::GraphBuilder, node::AttributeValue};

    #[test]
    fn test_index_maps_producers_and_consumers() {
        let mut b = GraphBuilder::new("g");
        b.input("x", vec![2]);
        b.constant_f32("w", vec![2], vec![1.0, 1.0]);
        b.node("Mul", ["x", "w"], ["h"], "mul");
        b.node("Add", ["h", "h"], ["y"], "add");
        b.node("Relu", ["h"], ["z"], "relu");
        b.output("y");
        let graph = b.build();
        let index = NameIndex::build(&graph);

        assert_eq!(index.producers_of("x"), &[Producer::Input]);
        assert!(index.is_constant("w"));
        assert_eq!(index.producing_nodes("h").collect::<Vec<_>>(), vec![0]);
        assert_eq!(index.consumers_of("h"), &[1, 2]);
        assert!(index.consumers_of("y").is_empty());
        assert!(index.producers_of("missing").is_empty());
    }

    #[test]
    fn test_subgraph_capture_counts_as_consumption() {
        let mut body = GraphBuilder::new("body");
        body.node("Identity", ["h"], ["r"], "inner");
        body.output("r");

        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1]);
        b.input("cond", vec![]);
        b.node("Relu", ["x"], ["h"], "relu");
        b.node_with(
            "If",
            ["cond"],
            ["y"],
            "if",
            ("then_branch", AttributeValue::Graph(Box::new(body.build()))),
        );
        let index = NameIndex::build(&b.build());
        assert_eq!(index.consumers_of("h"), &[1]);
    }
}
