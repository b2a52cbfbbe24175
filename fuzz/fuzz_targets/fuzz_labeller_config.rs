//! Fuzz target for labeller.toml parsing.
//!
//! Anything that parses must also survive semantic validation without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nl_config::{validate_config, LabellerConfig};

fuzz_target!(|data: &str| {
    if let Ok(config) = LabellerConfig::from_toml_str(data) {
        let _ = validate_config(&config);
    }
});
