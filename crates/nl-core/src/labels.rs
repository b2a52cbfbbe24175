//! Label set construction.
//!
//! [`build_labels`] maps derived capability facts to the labels the node
//! should carry. It is pure: the same inputs always produce the same set, and
//! advisories are returned rather than emitted.

use crate::capabilities::{supported_cpu_models, DerivedCapabilities};
use crate::events::Advisory;
use nl_common::labels::{TSC_FREQUENCY, TSC_SCALABLE};
use nl_common::{LabelKind, ManagedLabels};
use nl_config::ObsoleteModelSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TRUE: &str = "true";

/// Label key → value, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    fn flag(&mut self, kind: LabelKind, name: &str) {
        self.insert(kind.label(name), TRUE);
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Builder result: the target labels plus any advisories to surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOutput {
    pub labels: LabelSet,
    pub advisories: Vec<Advisory>,
}

/// Compute the labels a node with these capabilities should carry.
///
/// The host-model and migration labels need a known host model, and the
/// vendor label a known vendor. When either name is empty (ARM64, or a
/// descriptor without a vendor) its labels are left out entirely rather
/// than written as a bare prefix, which is not a valid label key. An
/// obsolete host model gets the obsolete flag and an advisory instead of
/// the migration label.
pub fn build_labels(
    derived: &DerivedCapabilities,
    obsolete: &ObsoleteModelSet,
    realtime: bool,
) -> LabelOutput {
    let mut labels = LabelSet::new();
    let mut advisories = Vec::new();

    for feature in &derived.supported_features {
        labels.flag(LabelKind::CpuFeature, feature);
    }

    for model in supported_cpu_models(&derived.usable_models, obsolete) {
        labels.flag(LabelKind::CpuModel, &model);
        labels.flag(LabelKind::MigrationModel, &model);
    }

    for feature in &derived.hyperv_features {
        labels.flag(LabelKind::Hyperv, feature);
    }

    if let Some(tsc) = derived.tsc {
        labels.insert(LabelKind::CpuTimer.label(TSC_FREQUENCY), tsc.frequency.to_string());
        labels.insert(LabelKind::CpuTimer.label(TSC_SCALABLE), tsc.scalable.to_string());
    }

    for feature in &derived.required_features {
        labels.flag(LabelKind::HostModelRequiredFeature, feature);
    }

    // An empty model or vendor name would produce a bare prefix, which is
    // not a valid label key.
    let host_model = derived.host_model.as_str();
    if !host_model.is_empty() {
        if obsolete.is_obsolete(host_model) {
            labels.insert(LabelKind::ObsoleteHostModel.key(), TRUE);
            advisories.push(Advisory::obsolete_host_model(
                host_model,
                &obsolete.obsolete_models(),
            ));
        } else {
            labels.flag(LabelKind::MigrationModel, host_model);
        }
        labels.flag(LabelKind::HostModel, host_model);
    }

    if !derived.vendor.is_empty() {
        labels.flag(LabelKind::CpuVendor, &derived.vendor);
    }

    if realtime {
        labels.insert(LabelKind::Realtime.key(), "");
    }
    if derived.sev.supported {
        labels.insert(LabelKind::Sev.key(), "");
    }
    if derived.sev.supported_es {
        labels.insert(LabelKind::SevEs.key(), "");
    }

    LabelOutput { labels, advisories }
}

/// Replace the managed subset of `current` with `target`.
///
/// Labels outside the managed domain are kept untouched.
pub fn merge_labels(
    current: &BTreeMap<String, String>,
    target: &LabelSet,
    managed: &ManagedLabels,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = current
        .iter()
        .filter(|(key, _)| !managed.owns(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(target.as_map().iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Arch, SevSupport, TscCounter};

    fn derived() -> DerivedCapabilities {
        DerivedCapabilities {
            arch: Arch::Amd64,
            vendor: "Intel".to_string(),
            host_model: "A".to_string(),
            required_features: vec!["x".to_string()],
            usable_models: vec!["B".to_string(), "C".to_string()],
            sev: SevSupport::default(),
            supported_features: vec!["ss".to_string()],
            hyperv_features: vec!["synic".to_string()],
            tsc: None,
        }
    }

    #[test]
    fn test_host_model_scenario() {
        let out = build_labels(&derived(), &ObsoleteModelSet::empty(), false);
        let labels = &out.labels;
        assert_eq!(labels.get("host-model-cpu.node.kubevirt.io/A"), Some("true"));
        assert_eq!(labels.get("cpu-model-migration.node.kubevirt.io/A"), Some("true"));
        assert_eq!(
            labels.get("host-model-required-features.node.kubevirt.io/x"),
            Some("true")
        );
        assert_eq!(labels.get("cpu-vendor.node.kubevirt.io/Intel"), Some("true"));
        assert_eq!(labels.get("cpu-model.node.kubevirt.io/B"), Some("true"));
        assert_eq!(labels.get("cpu-model-migration.node.kubevirt.io/C"), Some("true"));
        assert_eq!(labels.get("cpu-feature.node.kubevirt.io/ss"), Some("true"));
        assert_eq!(labels.get("hyperv.node.kubevirt.io/synic"), Some("true"));
        assert!(!labels.contains_key("node-labeller.kubevirt.io/obsolete-host-model"));
        assert!(!labels.contains_key("kubevirt.io/realtime"));
        assert!(out.advisories.is_empty());
    }

    #[test]
    fn test_obsolete_host_model() {
        let obsolete = ObsoleteModelSet::from_models(["A", "B"]);
        let out = build_labels(&derived(), &obsolete, false);
        assert_eq!(
            out.labels.get("node-labeller.kubevirt.io/obsolete-host-model"),
            Some("true")
        );
        assert!(!out.labels.contains_key("cpu-model-migration.node.kubevirt.io/A"));
        assert!(out.labels.contains_key("host-model-cpu.node.kubevirt.io/A"));
        assert!(!out.labels.contains_key("cpu-model.node.kubevirt.io/B"));
        assert_eq!(out.advisories.len(), 1);
        assert_eq!(out.advisories[0].reason, "HostModelIsObsolete");
        assert!(out.advisories[0].message.contains("A, B"));
    }

    #[test]
    fn test_tsc_and_flags() {
        let mut d = derived();
        d.tsc = Some(TscCounter {
            frequency: 2_400_000_000,
            scalable: false,
        });
        d.sev = SevSupport {
            supported: true,
            supported_es: true,
        };
        let out = build_labels(&d, &ObsoleteModelSet::empty(), true);
        assert_eq!(
            out.labels.get("cpu-timer.node.kubevirt.io/tsc-frequency"),
            Some("2400000000")
        );
        assert_eq!(
            out.labels.get("cpu-timer.node.kubevirt.io/tsc-scalable"),
            Some("false")
        );
        assert_eq!(out.labels.get("kubevirt.io/realtime"), Some(""));
        assert_eq!(out.labels.get("kubevirt.io/sev"), Some(""));
        assert_eq!(out.labels.get("kubevirt.io/sev-es"), Some(""));
    }

    #[test]
    fn test_empty_model_and_vendor_are_omitted() {
        let mut d = derived();
        d.host_model.clear();
        d.vendor.clear();
        let out = build_labels(&d, &ObsoleteModelSet::empty(), false);
        assert!(out
            .labels
            .iter()
            .all(|(k, _)| !k.starts_with("host-model-cpu.") && !k.starts_with("cpu-vendor.")));
    }

    #[test]
    fn test_every_built_key_is_managed() {
        let mut d = derived();
        d.tsc = Some(TscCounter {
            frequency: 1,
            scalable: true,
        });
        d.sev = SevSupport {
            supported: true,
            supported_es: true,
        };
        let managed = ManagedLabels::new();
        let out = build_labels(&d, &ObsoleteModelSet::from_models(["A"]), true);
        for (key, _) in out.labels.iter() {
            assert!(managed.owns(key), "{key} should be managed");
        }
    }

    #[test]
    fn test_merge_replaces_only_managed() {
        let current: BTreeMap<String, String> = [
            ("kubernetes.io/hostname", "node-a"),
            ("cpu-model.node.kubevirt.io/Old", "true"),
            ("kubevirt.io/realtime", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let target: LabelSet = [("cpu-model.node.kubevirt.io/New", "true")]
            .into_iter()
            .collect();

        let merged = merge_labels(&current, &target, &ManagedLabels::new());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["kubernetes.io/hostname"], "node-a");
        assert_eq!(merged["cpu-model.node.kubevirt.io/New"], "true");
    }
}
