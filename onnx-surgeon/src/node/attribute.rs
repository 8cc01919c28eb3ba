//! Kind-tagged operator attributes.

use std::fmt;

use crate::{
    error::{Result, SurgeryError},
    model::Graph,
    proto,
    tensor::Constant,
};

/// Discriminant of an [`AttributeValue`], numbered as in
/// `AttributeProto.AttributeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Float,
    Int,
    Bytes,
    Tensor,
    Graph,
    Floats,
    Ints,
    Strings,
    /// Any tag this crate does not edit (TENSORS, GRAPHS, sparse, type protos).
    Unsupported(i32),
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Unsupported(code) => write!(f, "kind tag {code}"),
            kind => write!(f, "{kind:?}"),
        }
    }
}

impl AttributeKind {
    pub fn code(self) -> i32 {
        use proto::attribute_type as t;
        match self {
            AttributeKind::Float => t::FLOAT,
            AttributeKind::Int => t::INT,
            AttributeKind::Bytes => t::STRING,
            AttributeKind::Tensor => t::TENSOR,
            AttributeKind::Graph => t::GRAPH,
            AttributeKind::Floats => t::FLOATS,
            AttributeKind::Ints => t::INTS,
            AttributeKind::Strings => t::STRINGS,
            AttributeKind::Unsupported(code) => code,
        }
    }
}

/// Value of a node attribute. The variant is the stored kind tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    Bytes(Vec<u8>),
    Tensor(Box<Constant>),
    Graph(Box<Graph>),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<Vec<u8>>),
    /// Kept verbatim so it survives a load/save round trip.
    Unsupported(Box<proto::AttributeProto>),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Bytes(_) => AttributeKind::Bytes,
            AttributeValue::Tensor(_) => AttributeKind::Tensor,
            AttributeValue::Graph(_) => AttributeKind::Graph,
            AttributeValue::Floats(_) => AttributeKind::Floats,
            AttributeValue::Ints(_) => AttributeKind::Ints,
            AttributeValue::Strings(_) => AttributeKind::Strings,
            AttributeValue::Unsupported(raw) => AttributeKind::Unsupported(raw.r#type),
        }
    }

    /// Converts `value` into the representation of `stored`.
    ///
    /// Integers widen into float slots; everything else must match exactly.
    /// List kinds are replaced wholesale by the returned value.
    fn coerce_into(stored: AttributeKind, value: &AttributeValue) -> Option<AttributeValue> {
        use AttributeValue as V;
        let coerced = match (stored, value) {
            (AttributeKind::Unsupported(_), _) => return None,
            (AttributeKind::Float, V::Int(i)) => V::Float(*i as f32),
            (AttributeKind::Floats, V::Ints(ints)) => {
                V::Floats(ints.iter().map(|&i| i as f32).collect())
            }
            (stored, value) if stored == value.kind() => value.clone(),
            _ => return None,
        };
        Some(coerced)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    pub doc_string: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
            doc_string: String::new(),
        }
    }

    pub fn kind(&self) -> AttributeKind {
        self.value.kind()
    }
}

/// Overwrites every attribute in `attributes` named `name` with `value`.
///
/// The write is dispatched on each attribute's stored kind. If any matching
/// attribute cannot take the value, nothing is written.
pub(crate) fn overwrite(
    attributes: &mut [Attribute],
    name: &str,
    value: &AttributeValue,
) -> Result<bool> {
    let mut writes = Vec::new();
    for (i, attr) in attributes.iter().enumerate() {
        if attr.name != name {
            continue;
        }
        let stored = attr.kind();
        if let AttributeKind::Unsupported(code) = stored {
            return Err(SurgeryError::UnsupportedKind(format!(
                "attribute `{name}` has kind tag {code}"
            )));
        }
        let coerced = AttributeValue::coerce_into(stored, value).ok_or_else(|| {
            SurgeryError::KindMismatch {
                attribute: name.to_string(),
                stored,
                given: value.kind(),
            }
        })?;
        writes.push((i, coerced));
    }

    let found = !writes.is_empty();
    for (i, coerced) in writes {
        attributes[i].value = coerced;
    }
    Ok(found)
}
