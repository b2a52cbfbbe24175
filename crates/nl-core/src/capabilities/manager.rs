//! Capability manager: reads the probe output directory and derives facts.

use super::arch::Arch;
use super::derive::{derive_capabilities, DeriveError, DerivedCapabilities};
use super::parse::{
    parse_domain_capabilities, parse_feature_list, parse_host_capabilities, Descriptor, ParseError,
};
use super::schema::{CapabilitySnapshot, HostCapabilities};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors loading capabilities from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Derive(#[from] DeriveError),
}

impl From<LoadError> for nl_common::Error {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Read { source, .. } => nl_common::Error::Io(source),
            LoadError::Parse(e) => e.into(),
            LoadError::Derive(e) => e.into(),
        }
    }
}

/// Anything that can produce fresh capability facts on demand.
///
/// The reconcile loop calls `load` once per cycle.
pub trait CapabilitySource: Send {
    fn load(&mut self) -> Result<DerivedCapabilities, LoadError>;
}

impl<F> CapabilitySource for F
where
    F: FnMut() -> Result<DerivedCapabilities, LoadError> + Send,
{
    fn load(&mut self) -> Result<DerivedCapabilities, LoadError> {
        self()
    }
}

/// Owned capability state for one host.
///
/// Holds nothing until [`CapabilityManager::reload`] succeeds. A failed load
/// leaves the previous facts in place.
#[derive(Debug, Clone)]
pub struct CapabilityManager {
    dir: PathBuf,
    arch: Arch,
    host: Option<HostCapabilities>,
    derived: Option<DerivedCapabilities>,
}

impl CapabilityManager {
    pub fn new(dir: impl Into<PathBuf>, arch: Arch) -> Self {
        Self {
            dir: dir.into(),
            arch,
            host: None,
            derived: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    /// Read every descriptor and derive fresh facts.
    pub fn reload(&mut self) -> Result<&DerivedCapabilities, LoadError> {
        let snapshot = self.read_snapshot()?;
        let derived = derive_capabilities(&snapshot, self.arch)?;
        debug!(
            arch = %self.arch,
            model = %derived.host_model,
            usable = derived.usable_models.len(),
            features = derived.supported_features.len(),
            "capabilities derived"
        );
        self.host = Some(snapshot.host);
        Ok(&*self.derived.insert(derived))
    }

    /// Parse the descriptors without deriving anything.
    pub fn read_snapshot(&self) -> Result<CapabilitySnapshot, LoadError> {
        let host = parse_host_capabilities(&self.read(Descriptor::HostCapabilities)?)?;
        let domain = parse_domain_capabilities(&self.read(Descriptor::DomainCapabilities)?)?;
        let features = if self.arch.rules().has_feature_list {
            Some(parse_feature_list(&self.read(Descriptor::FeatureList)?)?)
        } else {
            info!(arch = %self.arch, "skipping cpu feature list, not produced on this architecture");
            None
        };
        Ok(CapabilitySnapshot {
            host,
            domain,
            features,
        })
    }

    fn read(&self, descriptor: Descriptor) -> Result<String, LoadError> {
        let path = self.dir.join(descriptor.file_name());
        fs::read_to_string(&path).map_err(|source| LoadError::Read { path, source })
    }

    /// Facts from the last successful load.
    pub fn derived(&self) -> Option<&DerivedCapabilities> {
        self.derived.as_ref()
    }

    /// Host descriptor from the last successful load.
    pub fn host_capabilities(&self) -> Option<&HostCapabilities> {
        self.host.as_ref()
    }
}

impl CapabilitySource for CapabilityManager {
    fn load(&mut self) -> Result<DerivedCapabilities, LoadError> {
        self.reload().cloned()
    }
}
