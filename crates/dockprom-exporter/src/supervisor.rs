//! Worker supervisor: reconciles running workers with the runtime's target list.
//!
//! Each cycle prunes workers that reached `Stopped`, lists the marked targets,
//! starts a worker for every unknown id and signals stop for every id that
//! disappeared. Stopped-but-not-yet-pruned handles stay in the table until
//! their worker finishes, so at most one live worker exists per target id.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use dockprom_core::error::Result;

use crate::config::ExporterConfig;
use crate::obs::Gauge;
use crate::worker::{WorkerContext, WorkerHandle, WorkerState};

/// What one reconciliation cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub pruned: Vec<String>,
    /// Table size after the cycle (including workers still stopping).
    pub active: usize,
}

pub struct Supervisor {
    ctx: WorkerContext,
    marker: String,
    interval: Duration,
    max_discovery_failures: u32,
    workers: DashMap<String, WorkerHandle>,
    discovery_failures: AtomicU32,
    ready: AtomicBool,
    monitored_gauge: Arc<Gauge>,
    failures_gauge: Arc<Gauge>,
}

impl Supervisor {
    pub fn new(cfg: &ExporterConfig, ctx: WorkerContext) -> Result<Self> {
        let exposition = ctx.registry.exposition();
        let monitored_gauge = exposition.register_gauge(
            "dockprom_monitored_targets",
            "Targets with a live stats worker",
            &[],
        )?;
        let failures_gauge = exposition.register_gauge(
            "dockprom_discovery_failures_total",
            "Consecutive failed target discovery queries",
            &[],
        )?;

        Ok(Self {
            ctx,
            marker: cfg.monitor_label.clone(),
            interval: cfg.refresh_interval(),
            max_discovery_failures: cfg.max_discovery_failures,
            workers: DashMap::new(),
            discovery_failures: AtomicU32::new(0),
            ready: AtomicBool::new(false),
            monitored_gauge,
            failures_gauge,
        })
    }

    /// True after the first successful discovery.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn worker_ids(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.key().clone()).collect()
    }

    pub fn worker_state(&self, target_id: &str) -> Option<WorkerState> {
        self.workers.get(target_id).map(|w| w.state())
    }

    pub fn is_stop_requested(&self, target_id: &str) -> Option<bool> {
        self.workers.get(target_id).map(|w| w.is_stop_requested())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.discovery_failures.load(Ordering::Relaxed)
    }

    /// Drop handles whose worker has stopped.
    pub fn prune(&self) -> Vec<String> {
        let mut pruned = Vec::new();
        self.workers.retain(|id, handle| {
            if handle.is_stopped() {
                pruned.push(id.clone());
                false
            } else {
                true
            }
        });
        pruned
    }

    /// Run one reconciliation cycle.
    pub async fn reconcile_once(&self) -> Result<CycleReport> {
        let mut report = CycleReport {
            pruned: self.prune(),
            ..Default::default()
        };

        let targets = match self.ctx.runtime.list_targets(&self.marker).await {
            Ok(t) => t,
            Err(e) => {
                let n = self.discovery_failures.fetch_add(1, Ordering::Relaxed) + 1;
                set_self_metric(&self.failures_gauge, f64::from(n));
                return Err(e);
            }
        };
        self.discovery_failures.store(0, Ordering::Relaxed);
        set_self_metric(&self.failures_gauge, 0.0);
        self.ready.store(true, Ordering::Relaxed);

        let live: HashSet<&str> = targets.iter().map(|t| t.id.as_str()).collect();

        for target in &targets {
            if let Entry::Vacant(slot) = self.workers.entry(target.id.clone()) {
                slot.insert(WorkerHandle::spawn(target.id.clone(), self.ctx.clone()));
                report.started.push(target.id.clone());
            }
        }

        for handle in self.workers.iter() {
            if !live.contains(handle.key().as_str()) && !handle.is_stop_requested() {
                handle.stop();
                report.stopped.push(handle.key().clone());
            }
        }

        report.active = self.workers.len();
        let live_workers = self.workers.iter().filter(|w| !w.is_stop_requested()).count();
        set_self_metric(&self.monitored_gauge, live_workers as f64);
        Ok(report)
    }

    /// Reconcile every refresh interval until `shutdown` fires, then stop all workers.
    ///
    /// Discovery failures skip the cycle; with `max_discovery_failures > 0`
    /// reaching that many in a row ends the loop with the last error.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(marker = %self.marker, interval = ?self.interval, "supervisor started");

        loop {
            match self.reconcile_once().await {
                Ok(report) => {
                    tracing::debug!(
                        started = report.started.len(),
                        stopped = report.stopped.len(),
                        pruned = report.pruned.len(),
                        active = report.active,
                        "reconciliation cycle"
                    );
                }
                Err(e) => {
                    let failures = self.consecutive_failures();
                    tracing::warn!(error = %e, failures, "target discovery failed, skipping cycle");
                    if self.max_discovery_failures > 0 && failures >= self.max_discovery_failures {
                        tracing::error!(failures, "too many consecutive discovery failures");
                        self.shutdown().await;
                        return Err(e);
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop every worker and wait for their zeroing phase to finish.
    pub async fn shutdown(&self) {
        let ids = self.worker_ids();
        let handles: Vec<WorkerHandle> = ids
            .iter()
            .filter_map(|id| self.workers.remove(id).map(|(_, h)| h))
            .collect();

        for h in &handles {
            h.stop();
        }
        tracing::info!(workers = handles.len(), "stopping all workers");
        join_all(handles.into_iter().map(WorkerHandle::join)).await;
        set_self_metric(&self.monitored_gauge, 0.0);
    }
}

fn set_self_metric(gauge: &Gauge, value: f64) {
    if let Err(e) = gauge.set(&[], value) {
        tracing::error!(metric = gauge.name(), error = %e, kind = e.kind().as_str(), "self-metric update failed");
    }
}
