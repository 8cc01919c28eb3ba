use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    error::{Result, SurgeryError},
    model::Graph,
    resolver::NameIndex,
};

/// Summary of a reachability prune.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Pruning {
    pub kept_nodes: usize,
    pub removed_nodes: usize,
    pub removed_constants: usize,
    pub removed_inputs: usize,
    pub removed_value_infos: usize,
    pub removed_outputs: usize,
    /// The declared output the target node now produces.
    pub output: String,
}

impl Graph {
    /// Shrinks the graph to the nodes needed to compute `name`, then makes
    /// that node the producer of the graph's first declared output.
    ///
    /// Everything outside the backward closure of `name` is dropped: nodes,
    /// constants, declared inputs and shape annotations. Outputs beyond the
    /// first are removed. Applying the same prune twice is a no-op the
    /// second time.
    #[tracing::instrument(skip_all, name = "Graph::prune_to_reachable_from", fields(node = name))]
    pub fn prune_to_reachable_from(&mut self, name: &str) -> Result<Pruning> {
        let target = self
            .node_index(name)
            .ok_or_else(|| SurgeryError::not_found("node", name))?;
        let output = self
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| SurgeryError::precondition("graph declares no outputs"))?;
        if self.nodes[target].outputs.is_empty() {
            return Err(SurgeryError::precondition(format!(
                "node `{name}` has no outputs to rebind"
            )));
        }

        let index = NameIndex::build(self);
        let (retained, names) = self.backward_closure(&index, target);
        tracing::debug!(nodes = retained.len(), names = names.len(), "closure computed");
        self.ensure_acyclic(&index, &retained)?;

        // Rebinding must leave `output` with exactly one producer.
        if names.contains(&output) {
            return Err(SurgeryError::precondition(format!(
                "`{output}` is consumed upstream of `{name}`"
            )));
        }
        if let Some(&other) = retained
            .iter()
            .find(|&&i| i != target && self.nodes[i].outputs.contains(&output))
        {
            return Err(SurgeryError::precondition(format!(
                "`{output}` is already produced by `{}`",
                self.nodes[other].name
            )));
        }

        let before = self.nodes.len();
        let mut position = 0;
        self.nodes.retain(|_| {
            let keep = retained.contains(&position);
            position += 1;
            keep
        });
        let removed_nodes = before - self.nodes.len();

        let removed_constants = self.retain_constants(|name| names.contains(name));

        let before = self.inputs.len();
        self.inputs.retain(|i| names.contains(&i.name));
        let removed_inputs = before - self.inputs.len();

        let before = self.value_infos.len();
        self.value_infos.retain(|v| names.contains(&v.name));
        let removed_value_infos = before - self.value_infos.len();

        let target = retained.range(..target).count();
        self.nodes[target].outputs[0] = output.clone();
        let removed_outputs = self.outputs.len() - 1;
        self.outputs.truncate(1);

        tracing::debug!(
            removed_nodes,
            removed_constants,
            removed_inputs,
            removed_value_infos,
            removed_outputs,
            "graph pruned"
        );
        Ok(Pruning {
            kept_nodes: self.nodes.len(),
            removed_nodes,
            removed_constants,
            removed_inputs,
            removed_value_infos,
            removed_outputs,
            output,
        })
    }

    /// Nodes backward-reachable from `target` and every name they consume.
    fn backward_closure(
        &self,
        index: &NameIndex,
        target: usize,
    ) -> (BTreeSet<usize>, BTreeSet<String>) {
        let mut retained = BTreeSet::from([target]);
        let mut names = BTreeSet::new();
        let mut pending = self.nodes[target].consumed_names();
        while let Some(name) = pending.pop() {
            if names.contains(&name) {
                continue;
            }
            for producer in index.producing_nodes(&name) {
                if retained.insert(producer) {
                    pending.extend(self.nodes[producer].consumed_names());
                }
            }
            names.insert(name);
        }
        (retained, names)
    }

    /// Kahn's algorithm over the producer edges among `retained`.
    fn ensure_acyclic(&self, index: &NameIndex, retained: &BTreeSet<usize>) -> Result<()> {
        let mut indegree: BTreeMap<usize, usize> = retained.iter().map(|&i| (i, 0)).collect();
        let mut successors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &consumer in retained {
            let producers: BTreeSet<usize> = self.nodes[consumer]
                .consumed_names()
                .iter()
                .flat_map(|name| index.producing_nodes(name))
                .filter(|p| retained.contains(p))
                .collect();
            for producer in producers {
                *indegree.entry(consumer).or_default() += 1;
                successors.entry(producer).or_default().push(consumer);
            }
        }

        let mut ready: Vec<usize> = indegree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&i, _)| i)
            .collect();
        let mut visited = 0;
        while let Some(node) = ready.pop() {
            visited += 1;
            for &next in successors.get(&node).into_iter().flatten() {
                let d = indegree.entry(next).or_default();
                *d -= 1;
                if *d == 0 {
                    ready.push(next);
                }
            }
        }

        if visited < retained.len() {
            let stuck = indegree
                .iter()
                .find(|&(_, &d)| d > 0)
                .map(|(&i, _)| self.nodes[i].name.clone())
                .unwrap_or_default();
            return Err(SurgeryError::CyclicGraph { node: stuck });
        }
        Ok(())
    }
}
