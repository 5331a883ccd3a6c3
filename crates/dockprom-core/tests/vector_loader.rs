//! JSON stats vector loader shared by the core tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use dockprom_core::stats::RawStats;

pub fn load_raw(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).expect("missing test vector")
}

pub fn load(name: &str) -> RawStats {
    RawStats::from_slice(load_raw(name).as_bytes()).expect("vector must decode")
}

/// Snapshot with only the CPU counters populated.
pub fn cpu_snapshot(total: u64, kernel: u64, user: u64, system: u64) -> RawStats {
    let json = format!(
        r#"{{"cpu_stats":{{"cpu_usage":{{"total_usage":{total},"usage_in_kernelmode":{kernel},"usage_in_usermode":{user}}},"system_cpu_usage":{system}}}}}"#
    );
    RawStats::from_slice(json.as_bytes()).unwrap()
}
