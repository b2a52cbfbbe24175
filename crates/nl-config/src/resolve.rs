//! Configuration resolution and loading.
//!
//! Resolution order: CLI argument → environment variables → system config →
//! built-in defaults.

use crate::labeller::LabellerConfig;
use crate::validate::{validate_config, ValidationError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where the configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in /etc/node-labeller/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
const ENV_CONFIG_PATH: &str = "NODE_LABELLER_CONFIG";
const ENV_CONFIG_DIR: &str = "NODE_LABELLER_CONFIG_DIR";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "labeller.toml";

/// Application name for the system config directory.
const APP_NAME: &str = "node-labeller";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ConfigError> for nl_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(inner) => inner.into(),
            other => nl_common::Error::Config(other.to_string()),
        }
    }
}

/// A loaded configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: LabellerConfig,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve the configuration file path.
///
/// 1. Explicit CLI path (must exist)
/// 2. `NODE_LABELLER_CONFIG` (direct path)
/// 3. `NODE_LABELLER_CONFIG_DIR` + `labeller.toml`
/// 4. `/etc/node-labeller/labeller.toml`
/// 5. Built-in defaults (None)
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<(Option<PathBuf>, ConfigSource), ConfigError> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok((Some(path.to_path_buf()), ConfigSource::CliArgument));
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok((Some(path), ConfigSource::Environment));
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return Ok((Some(path), ConfigSource::Environment));
        }
    }

    let system_path = system_config_dir().join(CONFIG_FILENAME);
    if system_path.exists() {
        return Ok((Some(system_path), ConfigSource::SystemConfig));
    }

    Ok((None, ConfigSource::BuiltinDefault))
}

/// Load and validate configuration using the standard resolution order.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = resolve_config_path(cli_path)?;
    let config = match &path {
        Some(path) => load_config_file(path)?,
        None => LabellerConfig::default(),
    };
    validate_config(&config)?;
    Ok(ResolvedConfig {
        config,
        path,
        source,
    })
}

/// Load configuration from a specific file without validating it.
pub fn load_config_file(path: &Path) -> Result<LabellerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    LabellerConfig::from_toml_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
