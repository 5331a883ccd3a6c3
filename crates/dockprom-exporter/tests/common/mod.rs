//! In-memory container runtime shared by the exporter tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use dockprom_core::error::{DockpromError, Result};
use dockprom_core::stats::{CpuStats, CpuUsage, MemoryStats, PidsStats, RawStats, Target};
use dockprom_exporter::config::ExporterConfig;
use dockprom_exporter::obs::{Exposition, MetricRegistry};
use dockprom_exporter::runtime::{ContainerRuntime, StatsStream};
use dockprom_exporter::worker::WorkerContext;

/// How the fake produces snapshots for a target.
#[derive(Clone, Debug)]
pub enum StatsBehavior {
    /// A growing snapshot every `STREAM_TICK`.
    Ticking,
    /// Never yields (a hung engine call).
    Hung,
    /// Ends immediately with `NotFound`.
    Vanishes,
    /// Yields these snapshots one per `STREAM_TICK`, then stays open.
    Scripted(Vec<RawStats>),
}

pub const STREAM_TICK: Duration = Duration::from_millis(10);

#[derive(Default)]
pub struct FakeRuntime {
    targets: Mutex<Vec<Target>>,
    /// Ids listed but not resolvable (vanished between discovery and start).
    unresolvable: Mutex<HashSet<String>>,
    behavior: Mutex<HashMap<String, StatsBehavior>>,
    fail_listing: AtomicBool,
    stats_calls: Mutex<HashMap<String, u64>>,
    list_calls: AtomicU64,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_targets(&self, targets: Vec<Target>) {
        *self.targets.lock().unwrap() = targets;
    }

    pub fn set_behavior(&self, id: &str, behavior: StatsBehavior) {
        self.behavior.lock().unwrap().insert(id.to_string(), behavior);
    }

    pub fn set_unresolvable(&self, id: &str) {
        self.unresolvable.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// How many times a stats stream was opened for `id` (one per worker start).
    pub fn stats_calls(&self, id: &str) -> u64 {
        self.stats_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_targets(&self, _marker: &str) -> Result<Vec<Target>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(DockpromError::Runtime("engine unavailable".into()));
        }
        Ok(self.targets.lock().unwrap().clone())
    }

    async fn get_target(&self, id: &str) -> Result<Target> {
        if self.unresolvable.lock().unwrap().contains(id) {
            return Err(DockpromError::NotFound(format!("container {id}")));
        }
        self.targets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| DockpromError::NotFound(format!("container {id}")))
    }

    fn stats(&self, id: &str) -> StatsStream {
        *self.stats_calls.lock().unwrap().entry(id.to_string()).or_default() += 1;
        let behavior = self
            .behavior
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(StatsBehavior::Ticking);

        match behavior {
            StatsBehavior::Ticking => stream::unfold(0u64, |tick| async move {
                if tick > 0 {
                    tokio::time::sleep(STREAM_TICK).await;
                }
                Some((Ok(snapshot(tick)), tick + 1))
            })
            .boxed(),
            StatsBehavior::Hung => stream::pending().boxed(),
            StatsBehavior::Vanishes => {
                let id = id.to_string();
                stream::once(async move { Err(DockpromError::NotFound(format!("container {id}"))) }).boxed()
            }
            StatsBehavior::Scripted(snapshots) => stream::iter(snapshots)
                .then(|s| async move {
                    tokio::time::sleep(STREAM_TICK).await;
                    Ok::<_, DockpromError>(s)
                })
                .chain(stream::pending())
                .boxed(),
        }
    }
}

/// Snapshot number `tick`: CPU grows 100ms per 1s of host time.
pub fn snapshot(tick: u64) -> RawStats {
    RawStats {
        pids_stats: Some(PidsStats {
            current: Some(7),
            limit: None,
        }),
        cpu_stats: Some(CpuStats {
            cpu_usage: Some(CpuUsage {
                total_usage: Some(100_000_000 * tick),
                usage_in_kernelmode: Some(25_000_000 * tick),
                usage_in_usermode: Some(75_000_000 * tick),
            }),
            system_cpu_usage: Some(1_000_000_000 * (tick + 1)),
            online_cpus: Some(2),
        }),
        memory_stats: Some(MemoryStats {
            usage: Some(4096),
            max_usage: Some(8192),
            limit: Some(1 << 30),
        }),
        networks: Some(BTreeMap::from([(
            "eth0".to_string(),
            BTreeMap::from([
                ("rx_bytes".to_string(), serde_json::json!(1000 + tick)),
                ("tx_bytes".to_string(), serde_json::json!(500)),
            ]),
        )])),
        ..Default::default()
    }
}

/// Snapshot carrying memory only, as sent by a container mid-teardown.
pub fn memory_only_snapshot(usage: u64) -> RawStats {
    RawStats {
        memory_stats: Some(MemoryStats {
            usage: Some(usage),
            max_usage: None,
            limit: None,
        }),
        ..Default::default()
    }
}

pub fn target(id: &str, name: &str, labels: &[(&str, &str)]) -> Target {
    let labels = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Target::new(id, format!("/{name}"), labels)
}

pub fn test_config(expose: &[&str]) -> ExporterConfig {
    ExporterConfig {
        expose_labels: expose.iter().map(|s| s.to_string()).collect(),
        refresh_interval_secs: 1,
        ..Default::default()
    }
}

/// Registry + worker context wired to `runtime`.
pub fn context(cfg: &ExporterConfig, runtime: Arc<FakeRuntime>) -> WorkerContext {
    let schema = Arc::new(cfg.label_schema().unwrap());
    let registry = Arc::new(MetricRegistry::new(
        cfg.stats_prefix.clone(),
        &schema,
        Arc::new(Exposition::new()),
    ));
    WorkerContext {
        runtime,
        registry,
        schema,
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn eventually<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}
