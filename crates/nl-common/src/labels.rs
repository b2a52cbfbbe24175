//! Label and annotation keys owned by the node labeller.
//!
//! The labeller rewrites a fixed domain of node labels on every cycle. The
//! domain is an explicit registry: prefixed families (`<domain>/<name>`) are
//! matched by looking up the key's `<domain>/` part in a set, and standalone
//! keys are matched exactly. A key like `kubevirt.io/sev-extra` is therefore
//! never claimed just because it starts with `kubevirt.io/sev`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const CPU_FEATURE_PREFIX: &str = "cpu-feature.node.kubevirt.io/";
pub const CPU_MODEL_PREFIX: &str = "cpu-model.node.kubevirt.io/";
pub const MIGRATION_MODEL_PREFIX: &str = "cpu-model-migration.node.kubevirt.io/";
pub const CPU_TIMER_PREFIX: &str = "cpu-timer.node.kubevirt.io/";
pub const HYPERV_PREFIX: &str = "hyperv.node.kubevirt.io/";
pub const HOST_MODEL_PREFIX: &str = "host-model-cpu.node.kubevirt.io/";
pub const HOST_MODEL_REQUIRED_FEATURE_PREFIX: &str =
    "host-model-required-features.node.kubevirt.io/";
pub const CPU_VENDOR_PREFIX: &str = "cpu-vendor.node.kubevirt.io/";

pub const OBSOLETE_HOST_MODEL_LABEL: &str = "node-labeller.kubevirt.io/obsolete-host-model";
pub const REALTIME_LABEL: &str = "kubevirt.io/realtime";
pub const SEV_LABEL: &str = "kubevirt.io/sev";
pub const SEV_ES_LABEL: &str = "kubevirt.io/sev-es";

/// Node annotation that disables labelling for the node.
pub const SKIP_NODE_ANNOTATION: &str = "node-labeller.kubevirt.io/skip-node";

/// Timer label names under [`CPU_TIMER_PREFIX`].
pub const TSC_FREQUENCY: &str = "tsc-frequency";
pub const TSC_SCALABLE: &str = "tsc-scalable";

/// Every label family the labeller owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    CpuFeature,
    CpuModel,
    MigrationModel,
    CpuTimer,
    Hyperv,
    HostModel,
    HostModelRequiredFeature,
    CpuVendor,
    ObsoleteHostModel,
    Realtime,
    Sev,
    SevEs,
}

impl LabelKind {
    pub const ALL: [LabelKind; 12] = [
        LabelKind::CpuFeature,
        LabelKind::CpuModel,
        LabelKind::MigrationModel,
        LabelKind::CpuTimer,
        LabelKind::Hyperv,
        LabelKind::HostModel,
        LabelKind::HostModelRequiredFeature,
        LabelKind::CpuVendor,
        LabelKind::ObsoleteHostModel,
        LabelKind::Realtime,
        LabelKind::Sev,
        LabelKind::SevEs,
    ];

    /// Prefix for families, full key for standalone labels.
    pub fn key(self) -> &'static str {
        match self {
            LabelKind::CpuFeature => CPU_FEATURE_PREFIX,
            LabelKind::CpuModel => CPU_MODEL_PREFIX,
            LabelKind::MigrationModel => MIGRATION_MODEL_PREFIX,
            LabelKind::CpuTimer => CPU_TIMER_PREFIX,
            LabelKind::Hyperv => HYPERV_PREFIX,
            LabelKind::HostModel => HOST_MODEL_PREFIX,
            LabelKind::HostModelRequiredFeature => HOST_MODEL_REQUIRED_FEATURE_PREFIX,
            LabelKind::CpuVendor => CPU_VENDOR_PREFIX,
            LabelKind::ObsoleteHostModel => OBSOLETE_HOST_MODEL_LABEL,
            LabelKind::Realtime => REALTIME_LABEL,
            LabelKind::Sev => SEV_LABEL,
            LabelKind::SevEs => SEV_ES_LABEL,
        }
    }

    /// Whether this kind is a `<prefix><name>` family.
    pub fn is_family(self) -> bool {
        !matches!(
            self,
            LabelKind::ObsoleteHostModel | LabelKind::Realtime | LabelKind::Sev | LabelKind::SevEs
        )
    }

    /// Full label key for a family member (or the standalone key).
    pub fn label(self, name: &str) -> String {
        if self.is_family() {
            format!("{}{}", self.key(), name)
        } else {
            self.key().to_string()
        }
    }
}

/// Membership test for the managed label domain.
#[derive(Debug, Clone)]
pub struct ManagedLabels {
    prefixes: HashSet<&'static str>,
    exact: HashSet<&'static str>,
}

impl Default for ManagedLabels {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedLabels {
    pub fn new() -> Self {
        let mut prefixes = HashSet::new();
        let mut exact = HashSet::new();
        for kind in LabelKind::ALL {
            if kind.is_family() {
                prefixes.insert(kind.key());
            } else {
                exact.insert(kind.key());
            }
        }
        Self { prefixes, exact }
    }

    /// Whether `key` belongs to the labeller and may be rewritten.
    pub fn owns(&self, key: &str) -> bool {
        if self.exact.contains(key) {
            return true;
        }
        match key.find('/') {
            Some(idx) => {
                let (prefix, name) = key.split_at(idx + 1);
                !name.is_empty() && self.prefixes.contains(prefix)
            }
            None => false,
        }
    }

    /// Which family or standalone label `key` belongs to, if any.
    pub fn classify(&self, key: &str) -> Option<LabelKind> {
        if !self.owns(key) {
            return None;
        }
        LabelKind::ALL.into_iter().find(|kind| {
            if kind.is_family() {
                key.split_at(key.find('/').map_or(0, |i| i + 1)).0 == kind.key()
            } else {
                key == kind.key()
            }
        })
    }
}
