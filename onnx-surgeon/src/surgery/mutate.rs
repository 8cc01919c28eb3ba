use itertools::Itertools;
use serde::Serialize;

use crate::{
    error::{Result, SurgeryError},
    model::Graph,
    node::AttributeValue,
    tensor::{element_count, Constant, ElementKind, Fill, Payload, TensorData},
};

/// Outcome of overwriting a constant's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantWrite {
    pub constant: String,
    /// Length of the new raw payload in bytes.
    pub bytes: usize,
    /// `(previous, new)` dimensions when the write changed the recorded shape.
    pub shape_change: Option<(Vec<i64>, Vec<i64>)>,
    /// Whether a declared input of the same name had its dimensions replaced.
    pub input_updated: bool,
}

impl Graph {
    /// Overwrites the payload of constant `name` with `data`.
    ///
    /// `shape` is the shape of `data`; `None` keeps the recorded shape. A
    /// different shape is recorded on the constant and on a declared input of
    /// the same name, and logged as a warning. The new payload is always
    /// stored as raw little-endian bytes, replacing any typed representation.
    #[tracing::instrument(skip_all, name = "Graph::set_constant", fields(constant = name))]
    pub fn set_constant(
        &mut self,
        name: &str,
        data: TensorData,
        shape: Option<&[i64]>,
    ) -> Result<ConstantWrite> {
        let constant = self.writable_constant(name)?;
        if data.kind() != constant.kind {
            return Err(SurgeryError::ElementKindMismatch {
                constant: name.to_string(),
                stored: constant.kind,
                given: data.kind(),
            });
        }
        let dims = shape.map_or_else(|| constant.dims.clone(), <[i64]>::to_vec);
        let count = element_count(&dims)?;
        let len = data.len().ok_or_else(|| {
            SurgeryError::precondition(format!(
                "encoded payload for `{name}` is not a whole number of {} elements",
                constant.kind
            ))
        })?;
        if len != count {
            return Err(SurgeryError::precondition(format!(
                "payload for `{name}` has {len} elements, shape [{}] needs {count}",
                dims.iter().join(", ")
            )));
        }
        Ok(self.write_raw(name, data.to_le_bytes(), dims))
    }

    /// Overwrites constant `name` with ones or zeros of its current shape and kind.
    #[tracing::instrument(skip_all, name = "Graph::fill_constant", fields(constant = name, fill = %fill))]
    pub fn fill_constant(&mut self, name: &str, fill: Fill) -> Result<ConstantWrite> {
        let constant = self.writable_constant(name)?;
        let count = constant.element_count()?;
        let element = match fill {
            Fill::Ones => constant.kind.one(),
            Fill::Zeros => constant.kind.width().map(|w| vec![0; w]),
        }
        .ok_or_else(|| unsupported_string(name))?;
        let dims = constant.dims.clone();
        Ok(self.write_raw(name, element.repeat(count), dims))
    }

    /// Overwrites every attribute named `attribute` on node `node`.
    ///
    /// Returns `Ok(false)` when the node has no attribute of that name.
    #[tracing::instrument(skip_all, name = "Graph::set_attribute", fields(node = node, attribute = attribute))]
    pub fn set_attribute(
        &mut self,
        node: &str,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<bool> {
        self.find_node_mut(node)
            .ok_or_else(|| SurgeryError::not_found("node", node))?
            .set_attribute(attribute, value)
    }

    fn writable_constant(&self, name: &str) -> Result<&Constant> {
        let constant = self
            .find_constant(name)
            .ok_or_else(|| SurgeryError::not_found("constant", name))?;
        if constant.kind == ElementKind::String {
            return Err(unsupported_string(name));
        }
        if constant.kind.is_packed() {
            return Err(SurgeryError::UnsupportedKind(format!(
                "constant `{name}` packs {} elements two to a byte, which cannot be rewritten",
                constant.kind
            )));
        }
        Ok(constant)
    }

    /// Stores `bytes` as the payload of an existing constant, propagating a
    /// shape change to the same-named declared input.
    fn write_raw(&mut self, name: &str, bytes: Vec<u8>, dims: Vec<i64>) -> ConstantWrite {
        let mut write = ConstantWrite {
            constant: name.to_string(),
            bytes: bytes.len(),
            shape_change: None,
            input_updated: false,
        };
        let Some(constant) = self.find_constant_mut(name) else {
            return write;
        };
        constant.payload = Payload::Raw(bytes);
        if constant.dims == dims {
            return write;
        }

        let previous = std::mem::replace(&mut constant.dims, dims.clone());
        tracing::warn!(
            constant = name,
            from = ?previous,
            to = ?dims,
            "constant shape changed, consumers may need updating"
        );
        if let Some(input) = self.find_input_mut(name) {
            input.set_dims(&dims);
            write.input_updated = true;
        }
        write.shape_change = Some((previous, dims));
        write
    }
}

fn unsupported_string(name: &str) -> SurgeryError {
    SurgeryError::UnsupportedKind(format!("constant `{name}` holds strings, which cannot be rewritten"))
}
