//! Configuration validation errors and semantic validation.

use crate::labeller::LabellerConfig;
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 12,
            ValidationError::InvalidValue { .. } => 11,
            ValidationError::VersionMismatch { .. } => 13,
        }
    }
}

impl From<ValidationError> for nl_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                nl_common::Error::InvalidConfig { field, message }
            }
            other => nl_common::Error::Config(other.to_string()),
        }
    }
}

/// Longest accepted resync interval (one week).
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Largest accepted resync jitter factor.
pub const MAX_JITTER_FACTOR: f64 = 10.0;

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate labeller configuration semantically.
pub fn validate_config(config: &LabellerConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if let Some(name) = &config.node_name {
        if nl_common::NodeName::parse(name).is_none() {
            return Err(invalid("node_name", format!("not a valid node name: {:?}", name)));
        }
    }

    if config.capabilities_dir.as_os_str().is_empty() {
        return Err(invalid("capabilities_dir", "must not be empty"));
    }

    if let Some(arch) = &config.arch {
        if !matches!(arch.as_str(), "amd64" | "x86_64" | "arm64" | "aarch64" | "s390x") {
            return Err(invalid("arch", format!("unsupported architecture {:?}", arch)));
        }
    }

    let reconcile = &config.reconcile;
    if reconcile.interval_secs == 0 || reconcile.interval_secs > MAX_INTERVAL_SECS {
        return Err(invalid(
            "reconcile.interval_secs",
            format!(
                "must be in 1..={}, got {}",
                MAX_INTERVAL_SECS, reconcile.interval_secs
            ),
        ));
    }
    if !(0.0..=MAX_JITTER_FACTOR).contains(&reconcile.jitter_factor) {
        return Err(invalid(
            "reconcile.jitter_factor",
            format!(
                "must be in 0..={}, got {}",
                MAX_JITTER_FACTOR, reconcile.jitter_factor
            ),
        ));
    }
    if reconcile.workers == 0 {
        return Err(invalid("reconcile.workers", "must be > 0"));
    }
    if reconcile.backoff_base_ms == 0 {
        return Err(invalid("reconcile.backoff_base_ms", "must be > 0"));
    }
    if reconcile.backoff_base_ms > reconcile.backoff_max_secs.saturating_mul(1000) {
        return Err(ValidationError::SemanticError(format!(
            "reconcile.backoff_base_ms ({}ms) exceeds reconcile.backoff_max_secs ({}s)",
            reconcile.backoff_base_ms, reconcile.backoff_max_secs
        )));
    }
    if !reconcile.qps.is_finite() || reconcile.qps <= 0.0 {
        return Err(invalid(
            "reconcile.qps",
            format!("must be finite and > 0, got {}", reconcile.qps),
        ));
    }
    if reconcile.burst == 0 {
        return Err(invalid("reconcile.burst", "must be > 0"));
    }

    let probe = &config.realtime_probe;
    if probe.enabled {
        if probe.command.trim().is_empty() {
            return Err(invalid("realtime_probe.command", "must not be empty"));
        }
        if probe.setting.trim().is_empty() {
            return Err(invalid("realtime_probe.setting", "must not be empty"));
        }
        if probe.timeout_ms == 0 {
            return Err(invalid("realtime_probe.timeout_ms", "must be > 0"));
        }
    }

    Ok(())
}
