//! Declarative edit sequences read from JSON.
//!
//! ```json
//! {
//!   "config": { "verify_on_save": true },
//!   "steps": [
//!     { "op": "excise", "node": "dropout_1" },
//!     { "op": "fill_constant", "constant": "fc.bias", "fill": "zeros" },
//!     { "op": "set_attribute", "node": "leaky", "attribute": "alpha", "value": 0.2 },
//!     { "op": "prune_to", "node": "fc" }
//!   ]
//! }
//! ```

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    config::SurgeryConfig,
    error::{Result, SurgeryError},
    model::Model,
    node::{AttributeValue, Node},
    surgery::{ConstantWrite, Excision, Pruning},
    tensor::{Fill, TensorData},
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditPlan {
    #[serde(default)]
    pub config: SurgeryConfig,
    pub steps: Vec<EditStep>,
}

/// One graph edit, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditStep {
    Excise {
        node: String,
    },
    PruneTo {
        node: String,
    },
    SetConstant {
        constant: String,
        data: TensorData,
        #[serde(default)]
        shape: Option<Vec<i64>>,
    },
    FillConstant {
        constant: String,
        fill: Fill,
    },
    SetAttribute {
        node: String,
        attribute: String,
        value: AttributeArg,
    },
    /// Inserts `op_type` in front of `target`, reading the target's former
    /// first input and producing a tensor named after the new node.
    InsertBefore {
        target: String,
        op_type: String,
        name: String,
        #[serde(default)]
        attributes: BTreeMap<String, AttributeArg>,
    },
}

/// Attribute value as written in a plan. The stored kind of the attribute
/// decides how the value is applied, so `1` is accepted for a float slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeArg {
    Int(i64),
    Float(f32),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    String(String),
    Strings(Vec<String>),
}

impl From<AttributeArg> for AttributeValue {
    fn from(arg: AttributeArg) -> Self {
        match arg {
            AttributeArg::Int(i) => AttributeValue::Int(i),
            AttributeArg::Float(f) => AttributeValue::Float(f),
            AttributeArg::Ints(v) => AttributeValue::Ints(v),
            AttributeArg::Floats(v) => AttributeValue::Floats(v),
            AttributeArg::String(s) => AttributeValue::Bytes(s.into_bytes()),
            AttributeArg::Strings(v) => {
                AttributeValue::Strings(v.into_iter().map(String::into_bytes).collect())
            }
        }
    }
}

/// Report for one applied step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepOutcome {
    Excised(Excision),
    Pruned(Pruning),
    ConstantWritten(ConstantWrite),
    AttributeSet {
        node: String,
        attribute: String,
        found: bool,
    },
    Inserted {
        node: String,
        output: String,
    },
}

impl EditPlan {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Runs every step in order against `model`.
    ///
    /// Stops at the first failing step. Steps applied before it stay applied.
    #[tracing::instrument(skip_all, name = "EditPlan::apply", fields(steps = self.steps.len()))]
    pub fn apply(&self, model: &mut Model) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let outcome = step.apply(model).inspect_err(|e| {
                tracing::warn!(step = i, error = %e, "edit plan stopped");
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

impl EditStep {
    pub fn apply(&self, model: &mut Model) -> Result<StepOutcome> {
        let graph = model.graph_mut();
        let outcome = match self {
            EditStep::Excise { node } => StepOutcome::Excised(graph.excise(node)?),
            EditStep::PruneTo { node } => StepOutcome::Pruned(graph.prune_to_reachable_from(node)?),
            EditStep::SetConstant {
                constant,
                data,
                shape,
            } => StepOutcome::ConstantWritten(graph.set_constant(
                constant,
                data.clone(),
                shape.as_deref(),
            )?),
            EditStep::FillConstant { constant, fill } => {
                StepOutcome::ConstantWritten(graph.fill_constant(constant, *fill)?)
            }
            EditStep::SetAttribute {
                node,
                attribute,
                value,
            } => {
                let found = graph.set_attribute(node, attribute, value.clone().into())?;
                if !found {
                    tracing::warn!(node = %node, attribute = %attribute, "no attribute of that name");
                }
                StepOutcome::AttributeSet {
                    node: node.clone(),
                    attribute: attribute.clone(),
                    found,
                }
            }
            EditStep::InsertBefore {
                target,
                op_type,
                name,
                attributes,
            } => {
                let input = graph
                    .find_node(target)
                    .ok_or_else(|| SurgeryError::not_found("node", target.as_str()))?
                    .inputs
                    .first()
                    .cloned()
                    .ok_or_else(|| {
                        SurgeryError::precondition(format!(
                            "node `{target}` has no input to redirect"
                        ))
                    })?;
                let node = attributes.iter().fold(
                    Node::new(op_type.as_str(), [input], [name.as_str()], name.as_str()),
                    |node, (attr, value)| node.with_attribute(attr.as_str(), value.clone().into()),
                );
                let inserted = graph.insert_before(target, node)?;
                StepOutcome::Inserted {
                    node: inserted.name.clone(),
                    output: name.clone(),
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test::GraphBuilder;

    fn model() -> Model {
        let mut b = GraphBuilder::new("g");
        b.input("x", vec![1, 4]);
        b.constant_f32("bias", vec![4], vec![0.1; 4]);
        b.node("Add", ["x", "bias"], ["h"], "add");
        b.node("Dropout", ["h"], ["d"], "dropout");
        b.node_with(
            "LeakyRelu",
            ["d"],
            ["y"],
            "leaky",
            ("alpha", AttributeValue::Float(0.01)),
        );
        b.node("Relu", ["y"], ["z"], "tail");
        b.output("z");
        b.build_model()
    }

    #[test]
    fn test_plan_parses_every_step_kind() {
        let plan = EditPlan::from_json(
            r#"{
                "steps": [
                    { "op": "excise", "node": "dropout" },
                    { "op": "prune_to", "node": "leaky" },
                    { "op": "set_constant", "constant": "bias",
                      "data": { "kind": "float", "values": [1, 2, 3, 4] } },
                    { "op": "fill_constant", "constant": "bias", "fill": "ones" },
                    { "op": "set_attribute", "node": "leaky", "attribute": "alpha", "value": 0.2 },
                    { "op": "insert_before", "target": "leaky", "op_type": "Flatten",
                      "name": "flat", "attributes": { "axis": 1 } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.steps.len(), 6);
        assert_eq!(plan.config, SurgeryConfig::default());
        assert_eq!(
            plan.steps[2],
            EditStep::SetConstant {
                constant: "bias".to_string(),
                data: TensorData::Float(vec![1.0, 2.0, 3.0, 4.0]),
                shape: None,
            }
        );
        assert!(matches!(
            plan.steps[4],
            EditStep::SetAttribute {
                value: AttributeArg::Float(_),
                ..
            }
        ));
    }

    #[test]
    fn test_apply_runs_steps_in_order() {
        let mut model = model();
        let plan = EditPlan::from_json(
            r#"{ "steps": [
                { "op": "excise", "node": "dropout" },
                { "op": "set_attribute", "node": "leaky", "attribute": "alpha", "value": 1 },
                { "op": "prune_to", "node": "leaky" }
            ] }"#,
        )
        .unwrap();
        let outcomes = plan.apply(&mut model).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[1], StepOutcome::AttributeSet { found: true, .. }));
        let leaky = model.graph.find_node("leaky").unwrap();
        assert_eq!(leaky.inputs, vec!["h"]);
        assert_eq!(leaky.outputs, vec!["z"]);
        assert_eq!(leaky.attribute("alpha").unwrap().value, AttributeValue::Float(1.0));
        assert!(model.graph.find_node("tail").is_none());
        model.graph.check_references().unwrap();
    }

    #[test]
    fn test_apply_stops_at_first_failure() {
        let mut model = model();
        let plan = EditPlan {
            config: SurgeryConfig::default(),
            steps: vec![
                EditStep::FillConstant {
                    constant: "bias".to_string(),
                    fill: Fill::Zeros,
                },
                EditStep::Excise {
                    node: "add".to_string(),
                },
                EditStep::Excise {
                    node: "dropout".to_string(),
                },
            ],
        };
        assert!(matches!(
            plan.apply(&mut model),
            Err(SurgeryError::PreconditionViolation(_))
        ));
        let bias = model.graph.find_constant("bias").unwrap();
        assert!(bias.raw_data().unwrap().iter().all(|&b| b == 0));
        assert!(model.graph.find_node("dropout").is_some());
    }

    #[test]
    fn test_insert_before_step_reads_target_input() {
        let mut model = model();
        let step = EditStep::InsertBefore {
            target: "leaky".to_string(),
            op_type: "Flatten".to_string(),
            name: "flat".to_string(),
            attributes: BTreeMap::from([("axis".to_string(), AttributeArg::Int(1))]),
        };
        step.apply(&mut model).unwrap();
        let flat = model.graph.find_node("flat").unwrap();
        assert_eq!(flat.inputs, vec!["d"]);
        assert_eq!(flat.attribute("axis").unwrap().value, AttributeValue::Int(1));
        assert_eq!(model.graph.find_node("leaky").unwrap().inputs, vec!["flat"]);
    }

    #[test]
    fn test_unknown_op_is_a_plan_error() {
        let err = EditPlan::from_json(r#"{ "steps": [{ "op": "fold", "node": "a" }] }"#).unwrap_err();
        assert!(matches!(err, SurgeryError::Plan(_)));
    }
}
