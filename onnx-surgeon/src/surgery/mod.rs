//! In-place graph edits.
//!
//! Every edit validates its preconditions against a fresh
//! [`NameIndex`](crate::resolver::NameIndex) before it touches the graph, so a
//! returned error always means the graph is unchanged.

pub mod excise;
pub mod insert;
pub mod mutate;
pub mod prune;

pub use excise::Excision;
pub use mutate::ConstantWrite;
pub use prune::Pruning;
