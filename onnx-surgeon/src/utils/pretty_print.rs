use itertools::Itertools;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

use crate::{
    model::{Dim, Graph, Model, ValueInfo},
    node::{AttributeValue, Node},
    tensor::Constant,
};

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "#")]
    idx: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Operator")]
    op_type: String,
    #[tabled(rename = "Inputs")]
    inputs: String,
    #[tabled(rename = "Outputs")]
    outputs: String,
    #[tabled(rename = "Attributes")]
    attributes: String,
}

impl NodeRow {
    fn new(idx: usize, node: &Node) -> Self {
        let op_type = if node.domain.is_empty() {
            node.op_type.clone()
        } else {
            format!("{}::{}", node.domain, node.op_type)
        };
        let attributes = if node.attributes.is_empty() {
            "-".to_string()
        } else {
            node.attributes
                .iter()
                .map(|attr| format!("{}: {}", attr.name, summarize(&attr.value)))
                .join(", ")
        };
        NodeRow {
            idx,
            name: node.name.clone(),
            op_type,
            inputs: list_or_dash(&node.inputs),
            outputs: list_or_dash(&node.outputs),
            attributes,
        }
    }
}

#[derive(Tabled)]
struct ConstantRow {
    #[tabled(rename = "Constant")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Dims")]
    dims: String,
}

impl From<&Constant> for ConstantRow {
    fn from(constant: &Constant) -> Self {
        ConstantRow {
            name: constant.name.clone(),
            kind: constant.kind.to_string(),
            dims: format!("[{}]", constant.dims.iter().join(" × ")),
        }
    }
}

fn list_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.iter().join(", ")
    }
}

fn summarize(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Float(f) => f.to_string(),
        AttributeValue::Int(i) => i.to_string(),
        AttributeValue::Bytes(s) => format!("{:?}", String::from_utf8_lossy(s)),
        AttributeValue::Tensor(t) => format!("tensor {} [{}]", t.kind, t.dims.iter().join("×")),
        AttributeValue::Graph(g) => format!("graph `{}` ({} nodes)", g.name, g.nodes.len()),
        AttributeValue::Floats(v) => format!("[{}]", v.iter().join(", ")),
        AttributeValue::Ints(v) => format!("[{}]", v.iter().join(", ")),
        AttributeValue::Strings(v) => format!("{} strings", v.len()),
        AttributeValue::Unsupported(raw) => format!("<kind tag {}>", raw.r#type),
    }
}

fn describe(info: &ValueInfo) -> String {
    match &info.shape {
        None => info.name.clone(),
        Some(dims) => {
            let dims = dims
                .iter()
                .map(|d| match d {
                    Dim::Value(v) => v.to_string(),
                    Dim::Param(p) => p.clone(),
                    Dim::Unknown => "?".to_string(),
                })
                .join(" × ");
            format!("{} [{dims}]", info.name)
        }
    }
}

impl Model {
    /// Returns a pretty-printed table representation of the model's graph
    pub fn pretty_print(&self) -> String {
        let opsets = self
            .opset_import
            .iter()
            .map(|(domain, version)| {
                let domain = if domain.is_empty() { "ai.onnx" } else { domain.as_str() };
                format!("{domain} v{version}")
            })
            .join(", ");
        format!(
            "Producer: {} {}\nOpsets: {opsets}\n{}",
            self.producer_name,
            self.producer_version,
            self.graph.pretty_print()
        )
    }
}

impl Graph {
    /// Returns a pretty-printed table representation of the graph
    pub fn pretty_print(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Graph `{}`\n", self.name));
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        output.push_str(&format!("Total Nodes: {}\n", self.nodes.len()));
        output.push_str(&format!("Constants: {}\n", self.constants.len()));
        output.push_str(&format!(
            "Inputs: {}\n",
            self.inputs.iter().map(describe).join(", ")
        ));
        output.push_str(&format!(
            "Outputs: {}\n\n",
            self.outputs.iter().map(describe).join(", ")
        ));

        let rows: Vec<NodeRow> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| NodeRow::new(idx, node))
            .collect();

        if rows.is_empty() {
            output.push_str("No nodes in graph.\n");
            return output;
        }

        let table = Table::new(rows)
            .with(Style::modern())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();
        output.push_str(&table);
        output.push('\n');

        if !self.constants.is_empty() {
            let constants = Table::new(self.constants.iter().map(ConstantRow::from))
                .with(Style::modern())
                .to_string();
            output.push_str(&constants);
            output.push('\n');
        }
        output
    }
}
