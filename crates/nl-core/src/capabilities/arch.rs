//! Architecture tags and the per-architecture derivation rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host architecture, in Go/Kubernetes naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
    S390x,
}

/// Rules that differ between architectures. Looked up once per derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchRules {
    /// Vendor used when the host-model mode reports none.
    pub default_vendor: Option<&'static str>,
    /// Feature-list entries without a policy count as supported.
    pub include_unset_policy: bool,
    /// The `host-model` CPU mode can be used for guests.
    pub host_model_supported: bool,
    /// The baseline probe produces a feature list on this architecture.
    pub has_feature_list: bool,
}

const AMD64_RULES: ArchRules = ArchRules {
    default_vendor: None,
    include_unset_policy: false,
    host_model_supported: true,
    has_feature_list: true,
};

const ARM64_RULES: ArchRules = ArchRules {
    default_vendor: None,
    include_unset_policy: false,
    host_model_supported: false,
    has_feature_list: false,
};

// s390x descriptors carry no vendor and no feature policies; IBM is the only
// vendor for the platform.
const S390X_RULES: ArchRules = ArchRules {
    default_vendor: Some("IBM"),
    include_unset_policy: true,
    host_model_supported: true,
    has_feature_list: true,
};

impl Arch {
    /// Architecture this binary was compiled for, if supported.
    pub fn host() -> Option<Self> {
        std::env::consts::ARCH.parse().ok()
    }

    pub fn rules(self) -> &'static ArchRules {
        match self {
            Arch::Amd64 => &AMD64_RULES,
            Arch::Arm64 => &ARM64_RULES,
            Arch::S390x => &S390X_RULES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::S390x => "s390x",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "s390x" => Ok(Arch::S390x),
            _ => Err(format!("unsupported architecture: {}", s)),
        }
    }
}
