//! Typed capability descriptors.
//!
//! Mirrors the XML emitted by the hypervisor capability probe. Only the
//! elements the labeller reads are modelled; everything else is ignored
//! during decoding.

use serde::{Deserialize, Serialize};

/// Feature policy that marks a feature as required by the host CPU model.
pub const POLICY_REQUIRE: &str = "require";

/// Name of the CPU mode that inherits the host's CPU model.
pub const HOST_MODEL_MODE: &str = "host-model";

// ---------------------------------------------------------------------------
// Host capabilities (capabilities.xml)
// ---------------------------------------------------------------------------

/// Host capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostCapabilities {
    #[serde(default)]
    pub host: Host,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub cpu: HostCpu,
    #[serde(default)]
    pub topology: Option<NumaTopology>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostCpu {
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub counter: Option<CpuCounter>,
}

/// CPU clock counter (`<counter name='tsc' frequency='...' scaling='no'/>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuCounter {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@frequency", default)]
    pub frequency: u64,
    #[serde(rename = "@scaling", default)]
    pub scaling: Option<String>,
}

impl CpuCounter {
    pub fn is_tsc(&self) -> bool {
        self.name == "tsc"
    }

    pub fn is_scalable(&self) -> bool {
        self.scaling.as_deref() == Some("yes")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumaTopology {
    #[serde(default)]
    pub cells: Option<NumaCells>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumaCells {
    #[serde(rename = "@num", default)]
    pub num: u32,
    #[serde(rename = "cell", default)]
    pub cells: Vec<NumaCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumaCell {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(default)]
    pub memory: Option<NumaMemory>,
    #[serde(rename = "pages", default)]
    pub pages: Vec<NumaPages>,
    #[serde(default)]
    pub distances: Option<NumaDistances>,
    #[serde(default)]
    pub cpus: Option<NumaCpus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumaMemory {
    #[serde(rename = "@unit", default)]
    pub unit: String,
    #[serde(rename = "$text")]
    pub size: u64,
}

/// Free page count for one page size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumaPages {
    #[serde(rename = "@unit", default)]
    pub unit: String,
    #[serde(rename = "@size")]
    pub size: u64,
    #[serde(rename = "$text")]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumaDistances {
    #[serde(rename = "sibling", default)]
    pub siblings: Vec<NumaSibling>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumaSibling {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@value")]
    pub value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumaCpus {
    #[serde(rename = "@num", default)]
    pub num: u32,
    #[serde(rename = "cpu", default)]
    pub cpus: Vec<NumaCpu>,
}

/// One logical CPU and its place in the socket/die/core hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumaCpu {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@socket_id", default)]
    pub socket_id: Option<u32>,
    #[serde(rename = "@die_id", default)]
    pub die_id: Option<u32>,
    #[serde(rename = "@core_id", default)]
    pub core_id: Option<u32>,
    #[serde(rename = "@siblings", default)]
    pub siblings: Option<String>,
}

impl HostCapabilities {
    /// The TSC counter, if the host reports one.
    pub fn tsc_counter(&self) -> Option<&CpuCounter> {
        self.host.cpu.counter.as_ref().filter(|c| c.is_tsc())
    }

    /// NUMA cells in document order; empty when the host reports no topology.
    pub fn numa_cells(&self) -> &[NumaCell] {
        self.host
            .topology
            .as_ref()
            .and_then(|t| t.cells.as_ref())
            .map(|c| c.cells.as_slice())
            .unwrap_or(&[])
    }

    pub fn numa_cell_count(&self) -> usize {
        self.numa_cells().len()
    }
}

impl NumaCell {
    /// Logical CPU ids in this cell.
    pub fn cpu_ids(&self) -> Vec<u32> {
        self.cpus
            .as_ref()
            .map(|c| c.cpus.iter().map(|cpu| cpu.id).collect())
            .unwrap_or_default()
    }

    /// Distance to another cell, if reported.
    pub fn distance_to(&self, cell_id: u32) -> Option<u32> {
        self.distances
            .as_ref()?
            .siblings
            .iter()
            .find(|s| s.id == cell_id)
            .map(|s| s.value)
    }
}

// ---------------------------------------------------------------------------
// Domain capabilities (virsh_domcapabilities.xml)
// ---------------------------------------------------------------------------

/// Domain capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainCapabilities {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub cpu: DomainCpu,
    #[serde(default)]
    pub features: DomainFeatures,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainCpu {
    #[serde(rename = "mode", default)]
    pub modes: Vec<CpuMode>,
}

/// A guest CPU configuration mode (`host-passthrough`, `host-model`, `custom`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuMode {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@supported", default)]
    pub supported: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(rename = "model", default)]
    pub models: Vec<CpuModel>,
    #[serde(rename = "feature", default)]
    pub features: Vec<CpuFeature>,
}

impl CpuMode {
    pub fn is_host_model(&self) -> bool {
        self.name == HOST_MODEL_MODE
    }
}

/// A named CPU model entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuModel {
    #[serde(rename = "$text", default)]
    pub name: String,
    #[serde(rename = "@usable", default)]
    pub usable: Option<String>,
    #[serde(rename = "@fallback", default)]
    pub fallback: Option<String>,
    #[serde(rename = "@vendor", default)]
    pub vendor: Option<String>,
}

impl CpuModel {
    /// Only an explicit `usable='yes'` counts; `no` and unset do not.
    pub fn is_usable(&self) -> bool {
        self.usable.as_deref() == Some("yes")
    }
}

/// A CPU feature entry with its policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuFeature {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@policy", default)]
    pub policy: Option<String>,
}

impl CpuFeature {
    pub fn is_required(&self) -> bool {
        self.policy.as_deref() == Some(POLICY_REQUIRE)
    }

    pub fn has_policy(&self) -> bool {
        self.policy.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainFeatures {
    #[serde(default)]
    pub sev: Option<SevCapability>,
}

/// AMD SEV capability block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SevCapability {
    #[serde(rename = "@supported", default)]
    pub supported: String,
    #[serde(default)]
    pub cbitpos: u32,
    #[serde(rename = "reducedPhysBits", default)]
    pub reduced_phys_bits: u32,
    #[serde(rename = "maxGuests", default)]
    pub max_guests: u32,
    #[serde(rename = "maxESGuests", default)]
    pub max_es_guests: u32,
}

// ---------------------------------------------------------------------------
// CPU feature list (supported_features.xml)
// ---------------------------------------------------------------------------

/// Baseline CPU definition with its expanded feature list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureList {
    #[serde(rename = "@mode", default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub model: Option<CpuModel>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(rename = "feature", default)]
    pub features: Vec<CpuFeature>,
}

/// Everything one load reads from the probe output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySnapshot {
    pub host: HostCapabilities,
    pub domain: DomainCapabilities,
    /// Absent on architectures without a baseline feature list.
    pub features: Option<FeatureList>,
}
