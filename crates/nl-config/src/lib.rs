//! Node labeller configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `labeller.toml`
//! - The obsolete CPU model set
//! - Config resolution (CLI → env → system → defaults)
//! - Semantic validation
//! - A shared, change-notifying cluster configuration holder

pub mod cluster;
pub mod labeller;
pub mod obsolete;
pub mod resolve;
pub mod validate;

pub use cluster::ClusterConfig;
pub use labeller::{LabellerConfig, RealtimeProbeConfig, ReconcileConfig};
pub use obsolete::ObsoleteModelSet;
pub use resolve::{load_config, load_config_file, ConfigError, ConfigSource, ResolvedConfig};
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
