//! Shared fixture helpers for nl-core integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HOST_FILE: &str = "capabilities.xml";
pub const DOMAIN_FILE: &str = "virsh_domcapabilities.xml";
pub const FEATURES_FILE: &str = "supported_features.xml";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> String {
    let path = fixture_path(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e))
}

/// A capabilities directory populated from fixtures.
///
/// `features` is optional so architectures without a feature list can be
/// exercised.
pub fn capabilities_dir(host: &str, domain: &str, features: Option<&str>) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join(HOST_FILE), fixture(host)).expect("write host");
    fs::write(dir.path().join(DOMAIN_FILE), fixture(domain)).expect("write domain");
    if let Some(features) = features {
        fs::write(dir.path().join(FEATURES_FILE), fixture(features)).expect("write features");
    }
    dir
}

/// The default amd64 capability set.
pub fn amd64_dir() -> TempDir {
    capabilities_dir(
        "capabilities.xml",
        "virsh_domcapabilities.xml",
        Some("supported_features.xml"),
    )
}
