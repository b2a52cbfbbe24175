//! Fuzz target for `virsh_domcapabilities.xml` decoding and derivation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nl_core::capabilities::{parse_domain_capabilities, supported_host_cpus, supported_host_sev, Arch};

fuzz_target!(|data: &str| {
    let Ok(domain) = parse_domain_capabilities(data) else {
        return;
    };
    for arch in [Arch::Amd64, Arch::Arm64, Arch::S390x] {
        let _ = supported_host_cpus(&domain.cpu.modes, arch);
    }
    let sev = supported_host_sev(domain.features.sev.as_ref());
    assert!(!sev.supported_es || sev.supported);
});
