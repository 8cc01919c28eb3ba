use crate::{
    error::{Result, SurgeryError},
    model::Graph,
    node::Node,
    resolver::NameIndex,
};

impl Graph {
    /// Splices `node` in front of the node named `target`.
    ///
    /// The target's first input is redirected to `node.outputs[0]`, and `node`
    /// is placed immediately before the target in the node sequence. The
    /// caller wires `node`'s own inputs, usually to the target's former first
    /// input.
    #[tracing::instrument(skip_all, name = "Graph::insert_before", fields(target = target, op = %node.op_type))]
    pub fn insert_before(&mut self, target: &str, node: Node) -> Result<&mut Node> {
        let position = self
            .node_index(target)
            .ok_or_else(|| SurgeryError::not_found("node", target))?;
        if self.nodes[position].inputs.is_empty() {
            return Err(SurgeryError::precondition(format!(
                "node `{target}` has no input to redirect"
            )));
        }
        let Some(output) = node.outputs.first().filter(|o| !o.is_empty()).cloned() else {
            return Err(SurgeryError::precondition(format!(
                "inserted node `{}` has no output",
                node.name
            )));
        };
        if !node.name.is_empty() && self.find_node(&node.name).is_some() {
            return Err(SurgeryError::precondition(format!(
                "a node named `{}` already exists",
                node.name
            )));
        }
        let index = NameIndex::build(self);
        if let Some(clash) = node
            .outputs
            .iter()
            .find(|name| !name.is_empty() && !index.producers_of(name).is_empty())
        {
            return Err(SurgeryError::precondition(format!(
                "`{clash}` is already produced in the graph"
            )));
        }

        let previous = std::mem::replace(&mut self.nodes[position].inputs[0], output);
        tracing::debug!(from = %previous, to = %self.nodes[position].inputs[0], "target input redirected");
        self.nodes.insert(position, node);
        Ok(&mut self.nodes[position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::test::GraphBuilder, node::AttributeValue};

    fn chain() -> Graph {
        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1, 2, 2]);
        b.node("Relu", ["x"], ["h"], "relu");
        b.node("Gemm", ["h"], ["y"], "gemm");
        b.output("y");
        b.build()
    }

    #[test]
    fn test_insert_flatten_before_consumer() {
        let mut graph = chain();
        let flatten = Node::new("Flatten", ["h"], ["h_flat"], "flatten_0")
            .with_attribute("axis", AttributeValue::Int(1));
        let inserted = graph.insert_before("gemm", flatten).unwrap();
        assert_eq!(inserted.op_type, "Flatten");

        let order: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["relu", "flatten_0", "gemm"]);
        assert_eq!(graph.find_node("gemm").unwrap().inputs, vec!["h_flat"]);
        graph.check_references().unwrap();
    }

    #[test]
    fn test_insert_rejects_existing_output_name() {
        let mut graph = chain();
        let before = graph.clone();
        let clash = Node::new("Identity", ["x"], ["h"], "dup");
        assert!(matches!(
            graph.insert_before("gemm", clash),
            Err(SurgeryError::PreconditionViolation(_))
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_insert_before_missing_target() {
        let mut graph = chain();
        let node = Node::new("Flatten", ["h"], ["h_flat"], "flatten_0");
        assert!(matches!(
            graph.insert_before("ghost", node),
            Err(SurgeryError::NotFound { .. })
        ));
    }
}
