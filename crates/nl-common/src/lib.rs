//! Node labeller common types, label keys, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Node identity
//! - The managed label key registry
//! - Common error types

pub mod error;
pub mod labels;
pub mod node;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use labels::{LabelKind, ManagedLabels};
pub use node::NodeName;
