//! Derivation of publishable values from raw stats snapshots.
//!
//! All functions here are pure. Missing fields degrade the affected value to
//! zero (logged at debug level) and never fail.

use crate::stats::{BlkioEntry, RawStats};

/// Component of a container's cumulative CPU usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuComponent {
    Total,
    Kernel,
    User,
}

impl CpuComponent {
    pub const ALL: [CpuComponent; 3] = [CpuComponent::Total, CpuComponent::Kernel, CpuComponent::User];

    /// Metric name suffix (before the configured prefix).
    pub fn metric(self) -> &'static str {
        match self {
            CpuComponent::Total => "cpu_usage_total",
            CpuComponent::Kernel => "cpu_usage_system",
            CpuComponent::User => "cpu_usage_user",
        }
    }

    /// Cumulative nanoseconds for this component, if reported.
    pub fn read(self, stats: &RawStats) -> Option<u64> {
        let usage = stats.cpu_stats.as_ref()?.cpu_usage.as_ref()?;
        match self {
            CpuComponent::Total => usage.total_usage,
            CpuComponent::Kernel => usage.usage_in_kernelmode,
            CpuComponent::User => usage.usage_in_usermode,
        }
    }
}

/// Share of host CPU time consumed by `component` between two observations.
///
/// `(C_current - C_previous) / (system_current - system_previous)`, or `0.0`
/// when a field is missing or either delta is not positive.
pub fn cpu_rate(component: CpuComponent, current: &RawStats, previous: &RawStats) -> f64 {
    let (Some(c_cur), Some(c_prev), Some(s_cur), Some(s_prev)) = (
        component.read(current),
        component.read(previous),
        current.system_cpu_usage(),
        previous.system_cpu_usage(),
    ) else {
        tracing::debug!(component = component.metric(), "cpu counters missing, rate defaults to 0");
        return 0.0;
    };

    if c_cur <= c_prev || s_cur <= s_prev {
        return 0.0;
    }
    (c_cur - c_prev) as f64 / (s_cur - s_prev) as f64
}

/// True when any cumulative CPU counter went backwards between two observations
/// (for instance after the container restarted).
pub fn is_counter_reset(current: &RawStats, previous: &RawStats) -> bool {
    let decreased = |cur: Option<u64>, prev: Option<u64>| matches!((cur, prev), (Some(c), Some(p)) if c < p);

    decreased(current.system_cpu_usage(), previous.system_cpu_usage())
        || CpuComponent::ALL
            .iter()
            .any(|c| decreased(c.read(current), c.read(previous)))
}

/// True when `stats` can serve as a CPU baseline: it carries the host
/// counter and at least the total container counter.
pub fn has_cpu_counters(stats: &RawStats) -> bool {
    stats.system_cpu_usage().is_some() && CpuComponent::Total.read(stats).is_some()
}

/// Block I/O operation classes, in publication order.
pub const BLKIO_CLASSES: [&str; 5] = ["read", "write", "sync", "async", "total"];

/// Per-class sums of a block I/O counter list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlkioTotals {
    pub read: u64,
    pub write: u64,
    pub sync: u64,
    pub r#async: u64,
    pub total: u64,
}

impl BlkioTotals {
    /// (class, value) pairs in [`BLKIO_CLASSES`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> {
        BLKIO_CLASSES
            .into_iter()
            .zip([self.read, self.write, self.sync, self.r#async, self.total])
    }

    /// Sum over all classes.
    pub fn sum(&self) -> u64 {
        self.iter().map(|(_, v)| v).sum()
    }
}

/// Sum every entry whose operation tag matches a class, case-insensitively.
/// Entries with other tags (e.g. `Discard`) are ignored; absent data yields zeros.
pub fn aggregate_blkio(entries: Option<&[BlkioEntry]>) -> BlkioTotals {
    let mut out = BlkioTotals::default();
    for e in entries.unwrap_or_default() {
        let slot = match e.op.to_ascii_lowercase().as_str() {
            "read" => &mut out.read,
            "write" => &mut out.write,
            "sync" => &mut out.sync,
            "async" => &mut out.r#async,
            "total" => &mut out.total,
            _ => continue,
        };
        *slot = slot.saturating_add(e.value);
    }
    out
}

/// One network counter passed through as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct NetCounter {
    pub interface: String,
    pub counter: String,
    pub value: f64,
}

/// Flatten per-interface counters. Non-numeric values are skipped.
pub fn network_counters(stats: &RawStats) -> Vec<NetCounter> {
    let Some(networks) = stats.networks.as_ref() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (interface, counters) in networks {
        for (counter, value) in counters {
            match value.as_f64() {
                Some(value) => out.push(NetCounter {
                    interface: interface.clone(),
                    counter: counter.clone(),
                    value,
                }),
                None => {
                    tracing::debug!(%interface, %counter, "non-numeric network counter skipped");
                }
            }
        }
    }
    out
}

/// Everything a worker publishes for one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub pids: f64,
    /// Rates in [`CpuComponent::ALL`] order.
    pub cpu: [(CpuComponent, f64); 3],
    pub memory_usage: f64,
    pub memory_max_usage: f64,
    pub memory_limit: f64,
    pub networks: Vec<NetCounter>,
    pub blkio_bytes: BlkioTotals,
    pub blkio_ops: BlkioTotals,
}

fn or_zero(v: Option<u64>, field: &'static str) -> f64 {
    match v {
        Some(v) => v as f64,
        None => {
            tracing::debug!(field, "snapshot field missing, reporting 0");
            0.0
        }
    }
}

/// Derive all values from `current`, using `previous` as the CPU baseline.
///
/// Without a baseline (first observation) or after a counter reset the CPU
/// rates are reported as `0.0`.
pub fn derive(current: &RawStats, previous: Option<&RawStats>) -> Derived {
    let cpu = CpuComponent::ALL.map(|c| {
        let rate = match previous {
            Some(prev) if !is_counter_reset(current, prev) => cpu_rate(c, current, prev),
            _ => 0.0,
        };
        (c, rate)
    });

    let blkio = current.blkio_stats.as_ref();
    Derived {
        pids: or_zero(current.pids(), "pids_stats.current"),
        cpu,
        memory_usage: or_zero(current.memory_usage(), "memory_stats.usage"),
        memory_max_usage: or_zero(current.memory_max_usage(), "memory_stats.max_usage"),
        memory_limit: or_zero(current.memory_limit(), "memory_stats.limit"),
        networks: network_counters(current),
        blkio_bytes: aggregate_blkio(blkio.and_then(|b| b.io_service_bytes_recursive.as_deref())),
        blkio_ops: aggregate_blkio(blkio.and_then(|b| b.io_serviced_recursive.as_deref())),
    }
}
