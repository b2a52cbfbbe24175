//! Host capability discovery.
//!
//! - Descriptor schemas and parsers for the probe output files
//! - Per-architecture derivation rules
//! - The owned `CapabilityManager` that loads and derives on demand

mod arch;
mod derive;
mod manager;
mod parse;
mod schema;

pub use arch::{Arch, ArchRules};
pub use derive::{
    derive_capabilities, supported_cpu_models, supported_features, supported_host_cpus,
    supported_host_sev, DeriveError, DerivedCapabilities, HostCpuFacts, SevSupport, TscCounter,
    HYPERV_FEATURES,
};
pub use manager::{CapabilityManager, CapabilitySource, LoadError};
pub use parse::{
    parse_domain_capabilities, parse_feature_list, parse_host_capabilities, Descriptor, ParseError,
};
pub use schema::{
    CapabilitySnapshot, CpuCounter, CpuFeature, CpuMode, CpuModel, DomainCapabilities,
    DomainCpu, DomainFeatures, FeatureList, Host, HostCapabilities, HostCpu, NumaCell, NumaCells,
    NumaCpu, NumaCpus, NumaDistances, NumaMemory, NumaPages, NumaSibling, NumaTopology,
    SevCapability, HOST_MODEL_MODE, POLICY_REQUIRE,
};
