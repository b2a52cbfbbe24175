//! Capability derivation.
//!
//! Turns parsed descriptors into the facts the label builder consumes. The
//! functions here are pure; per-architecture differences come from
//! [`ArchRules`](super::arch::ArchRules).

use super::arch::Arch;
use super::schema::{CapabilitySnapshot, CpuMode, FeatureList, SevCapability};
use nl_config::ObsoleteModelSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

/// Hyper-V enlightenments the virtualization stack can expose to guests.
pub const HYPERV_FEATURES: &[&str] = &[
    "base",
    "frequencies",
    "ipi",
    "reenlightenment",
    "reset",
    "runtime",
    "synic",
    "synictimer",
    "time",
    "tlbflush",
    "vpindex",
];

/// Errors deriving facts from otherwise well-formed descriptors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("host-model cpu mode expected to contain a model")]
    MissingHostModel,
}

impl From<DeriveError> for nl_common::Error {
    fn from(err: DeriveError) -> Self {
        nl_common::Error::Derive(err.to_string())
    }
}

/// Host CPU facts read from the domain capability modes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCpuFacts {
    pub vendor: String,
    pub host_model: String,
    pub required_features: Vec<String>,
    pub usable_models: Vec<String>,
}

/// SEV support flags. `supported_es` implies `supported`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SevSupport {
    pub supported: bool,
    pub supported_es: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TscCounter {
    pub frequency: u64,
    pub scalable: bool,
}

/// Everything one load derives about the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedCapabilities {
    pub arch: Arch,
    pub vendor: String,
    pub host_model: String,
    pub required_features: Vec<String>,
    pub usable_models: Vec<String>,
    pub sev: SevSupport,
    pub supported_features: Vec<String>,
    pub hyperv_features: Vec<String>,
    pub tsc: Option<TscCounter>,
}

/// Push `value` unless already seen.
fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
    if seen.insert(value.to_string()) {
        out.push(value.to_string());
    }
}

/// Scan the CPU modes for host-model facts and usable models.
pub fn supported_host_cpus(modes: &[CpuMode], arch: Arch) -> Result<HostCpuFacts, DeriveError> {
    let rules = arch.rules();
    let mut facts = HostCpuFacts::default();
    let mut seen_models = HashSet::new();
    let mut seen_features = HashSet::new();

    for mode in modes {
        if mode.is_host_model() {
            if !rules.host_model_supported {
                warn!(arch = %arch, "host-model cpu mode is not supported on this architecture");
                continue;
            }

            facts.vendor = mode.vendor.clone().unwrap_or_default();
            if facts.vendor.is_empty() {
                if let Some(vendor) = rules.default_vendor {
                    facts.vendor = vendor.to_string();
                }
            }

            let first = mode.models.first().ok_or(DeriveError::MissingHostModel)?;
            if mode.models.len() > 1 {
                warn!(
                    count = mode.models.len(),
                    model = %first.name,
                    "host-model cpu mode lists more than one model, using the first"
                );
            }
            facts.host_model = first.name.clone();

            for feature in mode.features.iter().filter(|f| f.is_required()) {
                push_unique(&mut facts.required_features, &mut seen_features, &feature.name);
            }
        }

        for model in mode.models.iter().filter(|m| m.is_usable()) {
            push_unique(&mut facts.usable_models, &mut seen_models, &model.name);
        }
    }

    Ok(facts)
}

/// SEV flags from the domain capability features block.
pub fn supported_host_sev(sev: Option<&SevCapability>) -> SevSupport {
    let Some(sev) = sev else {
        return SevSupport::default();
    };
    let supported = sev.supported == "yes";
    SevSupport {
        supported,
        supported_es: supported && sev.max_es_guests > 0,
    }
}

/// Feature names from the baseline feature list.
pub fn supported_features(list: &FeatureList, arch: Arch) -> Vec<String> {
    let include_unset = arch.rules().include_unset_policy;
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for feature in &list.features {
        if feature.is_required() || (include_unset && !feature.has_policy()) {
            push_unique(&mut out, &mut seen, &feature.name);
        }
    }
    out
}

/// Usable models minus the obsolete ones, order preserved.
pub fn supported_cpu_models(usable: &[String], obsolete: &ObsoleteModelSet) -> Vec<String> {
    usable
        .iter()
        .filter(|model| !obsolete.is_obsolete(model))
        .cloned()
        .collect()
}

/// Derive all host facts from one snapshot.
pub fn derive_capabilities(
    snapshot: &CapabilitySnapshot,
    arch: Arch,
) -> Result<DerivedCapabilities, DeriveError> {
    let cpus = supported_host_cpus(&snapshot.domain.cpu.modes, arch)?;
    let sev = supported_host_sev(snapshot.domain.features.sev.as_ref());
    let features = snapshot
        .features
        .as_ref()
        .map(|list| supported_features(list, arch))
        .unwrap_or_default();
    let tsc = snapshot.host.tsc_counter().map(|counter| TscCounter {
        frequency: counter.frequency,
        scalable: counter.is_scalable(),
    });

    Ok(DerivedCapabilities {
        arch,
        vendor: cpus.vendor,
        host_model: cpus.host_model,
        required_features: cpus.required_features,
        usable_models: cpus.usable_models,
        sev,
        supported_features: features,
        hyperv_features: HYPERV_FEATURES.iter().map(|f| f.to_string()).collect(),
        tsc,
    })
}
