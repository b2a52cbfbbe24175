//! Structured logging.
//!
//! stdout is reserved for command payloads; all log output goes to stderr,
//! either human-readable or as JSON lines.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events pass the default filter.
const TARGETS: &[&str] = &["nl_core", "nl_config", "node_labeller"];

fn default_filter(level: LogLevel) -> EnvFilter {
    let directives: Vec<String> = TARGETS.iter().map(|t| format!("{}={}", t, level)).collect();
    EnvFilter::new(directives.join(","))
}

/// Install the global subscriber. Fails if one is already installed.
///
/// A full `RUST_LOG` directive takes over filtering when set.
pub fn init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.level));

    match config.format {
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry().with(filter).with(layer).try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
    }
}
