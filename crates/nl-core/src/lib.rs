//! Node labeller core library.
//!
//! - Capability descriptor parsing and derivation
//! - Host probes (realtime scheduling)
//! - Label set construction
//! - Node store access and the reconcile loop
//! - Logging setup and CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod capabilities;
pub mod events;
pub mod exit_codes;
pub mod labels;
pub mod logging;
pub mod node;
pub mod probe;
pub mod reconcile;

pub use reconcile::{CycleOutcome, NodeLabeller};
