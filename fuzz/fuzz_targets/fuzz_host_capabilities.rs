//! Fuzz target for `capabilities.xml` decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nl_core::capabilities::parse_host_capabilities;

fuzz_target!(|data: &str| {
    if let Ok(caps) = parse_host_capabilities(data) {
        // Accessors must hold up on whatever decoded.
        let _ = caps.tsc_counter();
        for cell in caps.numa_cells() {
            let _ = cell.cpu_ids();
            let _ = cell.distance_to(0);
        }
    }
});
