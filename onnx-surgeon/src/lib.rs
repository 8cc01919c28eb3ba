//! In-place editing of ONNX computation graphs.
//!
//! A [`Model`] is decoded from protobuf into an editable [`Graph`] whose edges
//! are implicit: nodes refer to tensors by name. The edits in [`surgery`]
//! restructure that graph while keeping every consumed name resolvable:
//!
//! - [`Graph::excise`] removes a pass-through node and rewires its consumers.
//! - [`Graph::prune_to_reachable_from`] keeps only what a chosen node needs.
//! - [`Graph::set_constant`] and [`Graph::fill_constant`] rewrite initializers.
//! - [`Graph::set_attribute`] overwrites operator attributes by stored kind.
//! - [`Graph::insert_before`] splices a new node in front of an existing one.
//!
//! ```no_run
//! use onnx_surgeon::{Model, SurgeryConfig, tensor::Fill};
//!
//! let mut model = Model::load("model.onnx")?;
//! model.graph_mut().excise("dropout_1")?;
//! model.graph_mut().fill_constant("fc.bias", Fill::Zeros)?;
//! model.save("edited.onnx", &SurgeryConfig::default())?;
//! # Ok::<(), onnx_surgeon::SurgeryError>(())
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod node;
pub mod plan;
pub mod proto;
pub mod resolver;
pub mod surgery;
pub mod tensor;
pub mod utils;

pub use config::SurgeryConfig;
pub use error::{Result, SurgeryError};
pub use model::{Graph, Model};
pub use node::{Attribute, AttributeKind, AttributeValue, Node};
pub use plan::{EditPlan, EditStep, StepOutcome};
pub use tensor::{Constant, ElementKind, TensorData};
