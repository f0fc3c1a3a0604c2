//! `workflows` crate — workflow definition models and pre-activation validation.

pub mod models;
pub mod error;
pub mod validate;

pub use models::{Edge, NodeDefinition, Trigger, WorkflowDefinition};
pub use error::WorkflowError;
pub use validate::{validate_dag, validate_for_activation};
