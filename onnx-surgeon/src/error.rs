//! Error types surfaced by graph edits and by the load/save boundary.

use thiserror::Error;

use crate::{node::AttributeKind, tensor::ElementKind};

pub type Result<T> = std::result::Result<T, SurgeryError>;

/// Errors that can occur while loading, editing or saving a graph.
///
/// None of these are fatal to the process; every edit either completes or
/// returns one of these before touching the graph.
#[derive(Debug, Error)]
pub enum SurgeryError {
    #[error("{kind} `{name}` not found")]
    NotFound { kind: &'static str, name: String },

    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("unsupported: {0}")]
    UnsupportedKind(String),

    #[error("attribute `{attribute}` is stored as {stored}, cannot write a {given} value")]
    KindMismatch {
        attribute: String,
        stored: AttributeKind,
        given: AttributeKind,
    },

    #[error("payload is {given} but constant `{constant}` holds {stored}")]
    ElementKindMismatch {
        constant: String,
        stored: ElementKind,
        given: ElementKind,
    },

    #[error("producer relation is cyclic around node `{node}`")]
    CyclicGraph { node: String },

    #[error("node `{node}` references `{name}` which nothing produces")]
    DanglingReference { node: String, name: String },

    #[error("`{name}` consumed by `{node}` has more than one producer")]
    AmbiguousReference { node: String, name: String },

    #[error("failed to decode model: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("edited model does not load: {0}")]
    Unloadable(String),

    #[error("invalid edit plan: {0}")]
    Plan(#[from] serde_json::Error),
}

impl SurgeryError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        SurgeryError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        SurgeryError::PreconditionViolation(message.into())
    }
}
