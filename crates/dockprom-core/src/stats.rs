//! Docker Engine stats wire types.
//!
//! Every field is optional: the engine omits or nulls sections depending on the
//! cgroup version and platform, and a missing section must only zero the
//! metrics derived from it.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DockpromError, Result};

/// One monitored workload. Observed, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Engine id, stable for the workload's lifetime.
    pub id: String,
    /// Display name without the engine's leading `/`.
    pub name: String,
    /// Labels attached to the workload.
    pub labels: BTreeMap<String, String>,
}

impl Target {
    pub fn new(id: impl Into<String>, name: impl AsRef<str>, labels: BTreeMap<String, String>) -> Self {
        Self {
            id: id.into(),
            name: display_name(name.as_ref()),
            labels,
        }
    }
}

/// Strip the leading `/` the engine puts in front of container names.
pub fn display_name(raw: &str) -> String {
    raw.strip_prefix('/').unwrap_or(raw).to_string()
}

/// One observation of one target (`GET /containers/{id}/stats`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStats {
    /// Engine timestamp of the observation (RFC 3339).
    #[serde(default)]
    pub read: Option<String>,
    #[serde(default)]
    pub pids_stats: Option<PidsStats>,
    #[serde(default)]
    pub cpu_stats: Option<CpuStats>,
    #[serde(default)]
    pub memory_stats: Option<MemoryStats>,
    /// Interface name -> counter name -> value.
    #[serde(default)]
    pub networks: Option<BTreeMap<String, BTreeMap<String, Value>>>,
    #[serde(default)]
    pub blkio_stats: Option<BlkioStats>,
}

impl RawStats {
    /// Decode one JSON document as produced by the stats endpoint.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| DockpromError::Decode(format!("stats json: {e}")))
    }

    pub fn pids(&self) -> Option<u64> {
        self.pids_stats.as_ref()?.current
    }

    pub fn memory_usage(&self) -> Option<u64> {
        self.memory_stats.as_ref()?.usage
    }

    pub fn memory_max_usage(&self) -> Option<u64> {
        self.memory_stats.as_ref()?.max_usage
    }

    pub fn memory_limit(&self) -> Option<u64> {
        self.memory_stats.as_ref()?.limit
    }

    pub fn system_cpu_usage(&self) -> Option<u64> {
        self.cpu_stats.as_ref()?.system_cpu_usage
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PidsStats {
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: Option<CpuUsage>,
    /// Host-wide cumulative CPU time in nanoseconds.
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub online_cpus: Option<u32>,
}

/// Cumulative CPU nanoseconds since the container started.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: Option<u64>,
    #[serde(default)]
    pub usage_in_kernelmode: Option<u64>,
    #[serde(default)]
    pub usage_in_usermode: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: Option<u64>,
    /// Peak usage; cgroup v2 hosts do not report it.
    #[serde(default)]
    pub max_usage: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlkioStats {
    /// Bytes transferred, one entry per (device, operation).
    #[serde(default)]
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
    /// Operations issued, one entry per (device, operation).
    #[serde(default)]
    pub io_serviced_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlkioEntry {
    #[serde(default)]
    pub major: u64,
    #[serde(default)]
    pub minor: u64,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: u64,
}

impl BlkioEntry {
    pub fn new(op: impl Into<String>, value: u64) -> Self {
        Self {
            major: 0,
            minor: 0,
            op: op.into(),
            value,
        }
    }
}
