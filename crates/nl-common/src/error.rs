//! Error types for the node labeller.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Retry hints for the reconcile loop
//!
//! # Error Codes
//!
//! ```text
//! 10-19  configuration
//! 20-29  capability descriptors (parse / derive)
//! 30-39  host probes
//! 40-49  node resource store
//! 60-69  I/O and serialization
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for node labeller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Capability descriptor parsing and derivation errors.
    Capability,
    /// Host probe errors (sysctl and friends).
    Probe,
    /// Node resource fetch/patch errors.
    Node,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Capability => write!(f, "capability"),
            ErrorCategory::Probe => write!(f, "probe"),
            ErrorCategory::Node => write!(f, "node"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the node labeller.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // Capability errors (20-29)
    #[error("malformed {descriptor} descriptor: {message}")]
    Parse { descriptor: String, message: String },

    #[error("capability derivation failed: {0}")]
    Derive(String),

    // Probe errors (30-39)
    #[error("host probe failed: {0}")]
    Probe(String),

    // Node errors (40-49)
    #[error("node {node} not found")]
    NodeNotFound { node: String },

    #[error("failed to fetch node: {0}")]
    NodeFetch(String),

    #[error("conflicting update on node {node}: labels changed since read")]
    NodeConflict { node: String },

    #[error("failed to patch node: {0}")]
    NodeWrite(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::Parse { .. } => 20,
            Error::Derive(_) => 21,
            Error::Probe(_) => 30,
            Error::NodeNotFound { .. } => 40,
            Error::NodeFetch(_) => 41,
            Error::NodeConflict { .. } => 42,
            Error::NodeWrite(_) => 43,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,
            Error::Parse { .. } | Error::Derive(_) => ErrorCategory::Capability,
            Error::Probe(_) => ErrorCategory::Probe,
            Error::NodeNotFound { .. }
            | Error::NodeFetch(_)
            | Error::NodeConflict { .. }
            | Error::NodeWrite(_) => ErrorCategory::Node,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether a later reconcile cycle can be expected to succeed without
    /// operator action.
    ///
    /// Node store failures and I/O are transient. Descriptor errors persist
    /// until the probe output changes, but the loop still requeues them so a
    /// refreshed descriptor gets picked up.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => false,
            Error::Parse { .. } | Error::Derive(_) => false,
            Error::Probe(_) => true,
            Error::NodeNotFound { .. } => true,
            Error::NodeFetch(_) | Error::NodeConflict { .. } | Error::NodeWrite(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => "Configuration Error",
            Error::Parse { .. } => "Malformed Capability Descriptor",
            Error::Derive(_) => "Capability Derivation Failed",
            Error::Probe(_) => "Host Probe Failed",
            Error::NodeNotFound { .. } => "Node Not Found",
            Error::NodeFetch(_) => "Node Fetch Failed",
            Error::NodeConflict { .. } => "Conflicting Node Update",
            Error::NodeWrite(_) => "Node Patch Failed",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "Serialization Error",
        }
    }

    /// Structured representation for JSON output.
    pub fn to_structured(&self) -> StructuredError {
        StructuredError {
            code: self.code(),
            category: self.category(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Serializable error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    pub retryable: bool,
}
