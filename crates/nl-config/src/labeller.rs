//! Typed labeller configuration (`labeller.toml`).

use crate::obsolete::ObsoleteModelSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory the capability probe writes its descriptors into.
pub const DEFAULT_CAPABILITIES_DIR: &str = "/var/lib/kubevirt-node-capabilities/";

/// Top-level labeller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabellerConfig {
    /// Schema version for compatibility checking.
    pub schema_version: String,

    /// Name of the node this agent labels. Falls back to `NODE_NAME`.
    pub node_name: Option<String>,

    /// Directory holding `capabilities.xml`, `virsh_domcapabilities.xml`
    /// and `supported_features.xml`.
    pub capabilities_dir: PathBuf,

    /// Architecture override (`amd64`, `arm64`, `s390x`). Defaults to the
    /// architecture this binary was built for.
    pub arch: Option<String>,

    /// Reconcile loop timing and retry settings.
    pub reconcile: ReconcileConfig,

    /// Realtime scheduling probe.
    pub realtime_probe: RealtimeProbeConfig,

    /// Cluster-supplied obsolete CPU models.
    pub obsolete_cpu_models: ObsoleteModelSet,
}

impl Default for LabellerConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            node_name: None,
            capabilities_dir: PathBuf::from(DEFAULT_CAPABILITIES_DIR),
            arch: None,
            reconcile: ReconcileConfig::default(),
            realtime_probe: RealtimeProbeConfig::default(),
            obsolete_cpu_models: ObsoleteModelSet::default(),
        }
    }
}

impl LabellerConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the node name: explicit config first, then `NODE_NAME`.
    pub fn resolved_node_name(&self) -> Option<String> {
        self.node_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| std::env::var("NODE_NAME").ok().filter(|n| !n.is_empty()))
    }

    pub fn with_capabilities_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.capabilities_dir = dir.as_ref().to_path_buf();
        self
    }
}

/// Reconcile loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Nominal period of the resync timer (seconds).
    pub interval_secs: u64,

    /// Jitter factor; each period is stretched by up to `factor * interval`.
    pub jitter_factor: f64,

    /// Number of queue workers.
    pub workers: usize,

    /// First retry delay after a failed cycle (milliseconds).
    pub backoff_base_ms: u64,

    /// Upper bound for the per-key retry delay (seconds).
    pub backoff_max_secs: u64,

    /// Overall retry rate (tokens per second).
    pub qps: f64,

    /// Overall retry burst size.
    pub burst: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 180,
            jitter_factor: 1.2,
            workers: 1,
            backoff_base_ms: 5,
            backoff_max_secs: 1000,
            qps: 10.0,
            burst: 100,
        }
    }
}

/// Realtime scheduling probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeProbeConfig {
    /// Disable to never emit the realtime label.
    pub enabled: bool,

    /// Command used to read the kernel setting.
    pub command: String,

    /// Kernel setting queried.
    pub setting: String,

    /// Probe timeout (milliseconds).
    pub timeout_ms: u64,
}

impl Default for RealtimeProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "sysctl".to_string(),
            setting: "kernel.sched_rt_runtime_us".to_string(),
            timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LabellerConfig::default();
        assert_eq!(config.reconcile.interval_secs, 180);
        assert_eq!(config.reconcile.workers, 1);
        assert_eq!(
            config.capabilities_dir,
            PathBuf::from("/var/lib/kubevirt-node-capabilities/")
        );
        assert!(config.obsolete_cpu_models.is_obsolete("qemu64"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LabellerConfig::from_toml_str(
            r#"
node_name = "worker-0"

[reconcile]
interval_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(config.node_name.as_deref(), Some("worker-0"));
        assert_eq!(config.reconcile.interval_secs, 60);
        assert_eq!(config.reconcile.burst, 100);
        assert_eq!(config.realtime_probe.command, "sysctl");
    }

    #[test]
    fn test_obsolete_models_table() {
        let config = LabellerConfig::from_toml_str(
            r#"
[obsolete_cpu_models]
Penryn = true
Nehalem = false
"#,
        )
        .unwrap();
        assert!(config.obsolete_cpu_models.is_obsolete("Penryn"));
        assert!(!config.obsolete_cpu_models.is_obsolete("Nehalem"));
        assert!(!config.obsolete_cpu_models.is_obsolete("qemu64"));
    }

    #[test]
    fn test_explicit_node_name_wins() {
        let config = LabellerConfig {
            node_name: Some("explicit".to_string()),
            ..LabellerConfig::default()
        };
        assert_eq!(config.resolved_node_name().as_deref(), Some("explicit"));
    }
}
