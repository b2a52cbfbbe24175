//! Fuzz target for `supported_features.xml` decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nl_core::capabilities::{parse_feature_list, supported_features, Arch};

fuzz_target!(|data: &str| {
    if let Ok(list) = parse_feature_list(data) {
        let amd64 = supported_features(&list, Arch::Amd64);
        let s390x = supported_features(&list, Arch::S390x);
        assert!(amd64.len() <= s390x.len());
    }
});
