use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    error::{Result, SurgeryError},
    model::Graph,
    resolver::NameIndex,
};

/// What an excision removed and rewired.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Excision {
    pub node: String,
    pub op_type: String,
    /// The excised node's input; its former consumers now read this name.
    pub rewired_to: String,
    /// The excised node's output, which no longer exists in the graph.
    pub removed_name: String,
    /// Number of rewritten references across all consumers.
    pub rewired_references: usize,
    pub removed_constant: Option<String>,
    pub removed_inputs: usize,
    pub removed_value_infos: usize,
}

impl Graph {
    /// Removes the single-input, single-output node named `name` and splices
    /// its consumers onto its input.
    #[tracing::instrument(skip_all, name = "Graph::excise", fields(node = name))]
    pub fn excise(&mut self, name: &str) -> Result<Excision> {
        let idx = self
            .node_index(name)
            .ok_or_else(|| SurgeryError::not_found("node", name))?;
        self.excise_at(idx)
    }

    /// Excises the node at position `idx` of the node sequence.
    ///
    /// The input is removed as a constant only if nothing references it once
    /// the rewire is done; the output name is removed from the declared
    /// inputs and the shape annotations unconditionally.
    pub fn excise_at(&mut self, idx: usize) -> Result<Excision> {
        let node = self
            .nodes
            .get(idx)
            .ok_or_else(|| SurgeryError::not_found("node index", idx.to_string()))?;
        let (input, output) = match (node.inputs.as_slice(), node.outputs.as_slice()) {
            ([input], [output]) if !input.is_empty() && !output.is_empty() => {
                (input.clone(), output.clone())
            }
            _ => {
                return Err(SurgeryError::precondition(format!(
                    "node `{}` has {} inputs and {} outputs, excision needs exactly one of each",
                    node.name,
                    node.inputs.len(),
                    node.outputs.len()
                )));
            }
        };
        if input == output {
            return Err(SurgeryError::precondition(format!(
                "node `{}` reads and writes `{input}`",
                node.name
            )));
        }
        if self.is_output(&output) {
            return Err(SurgeryError::precondition(format!(
                "node `{}` produces the declared output `{output}`",
                node.name
            )));
        }

        let index = NameIndex::build(self);
        let consumers: Vec<usize> = index
            .consumers_of(&output)
            .iter()
            .copied()
            .filter(|&c| c != idx)
            .collect();
        if let Some(&shadowed) = consumers.iter().find(|&&c| {
            self.nodes[c]
                .subgraphs()
                .any(|g| g.capture_would_shadow(&output, &input))
        }) {
            return Err(SurgeryError::precondition(format!(
                "a subgraph of `{}` defines its own `{input}`, so its read of `{output}` cannot be rewired",
                self.nodes[shadowed].name
            )));
        }
        let input_still_read = !consumers.is_empty()
            || index.consumers_of(&input).iter().any(|&c| c != idx)
            || self.is_output(&input);

        let mut rewired_references = 0;
        for &consumer in &consumers {
            rewired_references += self.nodes[consumer].rename_input(&output, &input);
        }

        let mut dead = BTreeSet::from([output.clone()]);
        let mut removed_constant = None;
        if index.is_constant(&input) {
            if input_still_read {
                tracing::debug!(constant = %input, "constant still referenced after rewire, keeping it");
            } else {
                let orphan = BTreeSet::from([input.clone()]);
                self.remove_constants(&orphan);
                dead.insert(input.clone());
                removed_constant = Some(input.clone());
            }
        }
        let removed_inputs = self.remove_inputs(&dead);
        let removed_value_infos = self.remove_value_infos(&dead);
        let node = self.nodes.remove(idx);

        tracing::debug!(
            consumers = consumers.len(),
            rewired_references,
            removed_inputs,
            removed_value_infos,
            "node excised"
        );
        Ok(Excision {
            node: node.name,
            op_type: node.op_type,
            rewired_to: input,
            removed_name: output,
            rewired_references,
            removed_constant,
            removed_inputs,
            removed_value_infos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::test::GraphBuilder, node::AttributeValue};

    /// x -> relu -> y -> id -> h -> add(h, h) -> z
    fn pass_through() -> Graph {
        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1, 4]);
        b.node("Relu", ["x"], ["y"], "relu");
        b.node("Identity", ["y"], ["h"], "id");
        b.node("Add", ["h", "h"], ["z"], "add");
        b.value_info("h", vec![1, 4]);
        b.output("z");
        b.build()
    }

    #[test]
    fn test_excise_rewires_every_occurrence() {
        let mut graph = pass_through();
        let report = graph.excise("id").unwrap();

        assert_eq!(report.rewired_to, "y");
        assert_eq!(report.removed_name, "h");
        assert_eq!(report.rewired_references, 2);
        assert_eq!(report.removed_value_infos, 1);
        assert!(graph.find_node("id").is_none());
        assert_eq!(graph.find_node("add").unwrap().inputs, vec!["y", "y"]);
        assert!(graph.find_value_info("h").is_none());
        graph.check_references().unwrap();
    }

    #[test]
    fn test_excise_missing_node_leaves_graph_unchanged() {
        let mut graph = pass_through();
        let before = graph.clone();
        assert!(matches!(
            graph.excise("ghost"),
            Err(SurgeryError::NotFound { kind: "node", .. })
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_excise_rejects_multi_input_node() {
        let mut graph = pass_through();
        let before = graph.clone();
        assert!(matches!(
            graph.excise("add"),
            Err(SurgeryError::PreconditionViolation(_))
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_excise_rejects_producer_of_declared_output() {
        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1]);
        b.node("Relu", ["x"], ["y"], "relu");
        b.output("y");
        let mut graph = b.build();
        assert!(matches!(
            graph.excise("relu"),
            Err(SurgeryError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_excise_removes_constant_fed_only_to_node() {
        let mut b = GraphBuilder::new("g");
        b.constant_f32("c", vec![2], vec![1.0, 2.0]);
        b.node("Identity", ["c"], ["d"], "id");
        b.node("Relu", ["x"], ["y"], "relu");
        b.input("x", vec![2]);
        b.output("y");
        let mut graph = b.build();
        graph.inputs.push(crate::model::ValueInfo::new("c", 1, None));
        graph.value_infos.push(crate::model::ValueInfo::new("c", 1, None));

        let report = graph.excise("id").unwrap();
        assert_eq!(report.removed_constant.as_deref(), Some("c"));
        assert!(graph.find_constant("c").is_none());
        assert!(graph.find_input("c").is_none());
        assert!(graph.find_value_info("c").is_none());
        graph.check_references().unwrap();
    }

    #[test]
    fn test_excise_keeps_constant_that_is_still_consumed() {
        let mut b = GraphBuilder::new("g");
        b.constant_f32("c", vec![2], vec![1.0, 2.0]);
        b.node("Identity", ["c"], ["d"], "id");
        b.node("Relu", ["d"], ["y"], "relu");
        b.output("y");
        let mut graph = b.build();

        let report = graph.excise("id").unwrap();
        assert_eq!(report.removed_constant, None);
        assert!(graph.find_constant("c").is_some());
        assert_eq!(graph.find_node("relu").unwrap().inputs, vec!["c"]);
        graph.check_references().unwrap();
    }

    #[test]
    fn test_excise_rewires_subgraph_capture() {
        let mut body = GraphBuilder::new("then");
        body.node("Relu", ["h"], ["r"], "inner");
        body.output("r");

        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1]);
        b.input("cond", vec![]);
        b.node("Identity", ["x"], ["h"], "id");
        b.node_with(
            "If",
            ["cond"],
            ["y"],
            "if",
            ("then_branch", AttributeValue::Graph(Box::new(body.build()))),
        );
        b.output("y");
        let mut graph = b.build();

        let report = graph.excise("id").unwrap();
        assert_eq!(report.rewired_references, 1);
        let branch = graph.find_node("if").unwrap().subgraphs().next().unwrap();
        assert_eq!(branch.nodes[0].inputs, vec!["x"]);
        graph.check_references().unwrap();
    }

    #[test]
    fn test_excise_rejects_capture_shadowed_by_subgraph() {
        let mut body = GraphBuilder::new("then");
        body.constant_f32("x", vec![1], vec![0.0]);
        body.node("Add", ["h", "x"], ["r"], "inner");
        body.output("r");

        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1]);
        b.input("cond", vec![]);
        b.node("Identity", ["x"], ["h"], "id");
        b.node_with(
            "If",
            ["cond"],
            ["y"],
            "if",
            ("then_branch", AttributeValue::Graph(Box::new(body.build()))),
        );
        b.output("y");
        let mut graph = b.build();
        let before = graph.clone();

        assert!(matches!(
            graph.excise("id"),
            Err(SurgeryError::PreconditionViolation(_))
        ));
        assert_eq!(graph, before);
    }
}
