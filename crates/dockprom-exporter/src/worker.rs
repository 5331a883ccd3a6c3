//! Per-target stats worker.
//!
//! Lifecycle: `Starting -> Streaming -> Stopping -> Stopped`.
//! - Starting: resolve the target and compute its fixed label set.
//! - Streaming: derive and publish every snapshot until cancelled or the
//!   stream ends.
//! - Stopping: publish zeros for the headline metrics so scrapers see the
//!   usage drop instead of a frozen value.
//!
//! A worker never touches the supervisor's bookkeeping; the supervisor prunes
//! handles whose worker reached `Stopped`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use dockprom_core::derive::{derive, has_cpu_counters, is_counter_reset, Derived};
use dockprom_core::error::{ErrorKind, Result};
use dockprom_core::labels::{LabelSchema, LabelSet};
use dockprom_core::stats::RawStats;

use crate::obs::MetricRegistry;
use crate::runtime::ContainerRuntime;

/// Headline metrics zeroed when a worker stops.
pub const HEADLINE_METRICS: [&str; 5] = [
    "pids",
    "cpu_usage_total",
    "cpu_usage_system",
    "cpu_usage_user",
    "memory_usage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Streaming = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Starting,
            1 => WorkerState::Streaming,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Collaborators every worker needs.
#[derive(Clone)]
pub struct WorkerContext {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub registry: Arc<MetricRegistry>,
    pub schema: Arc<LabelSchema>,
}

/// Supervisor-side handle of one running worker.
pub struct WorkerHandle {
    target_id: String,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn the worker task and return immediately.
    pub fn spawn(target_id: impl Into<String>, ctx: WorkerContext) -> Self {
        let target_id = target_id.into();
        let cancel = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(WorkerState::Starting as u8));

        let worker = StatsWorker {
            target_id: target_id.clone(),
            ctx,
            cancel: cancel.clone(),
            state: Arc::clone(&state),
        };
        let span = tracing::info_span!("worker", target_id = %target_id);
        let join = tokio::spawn(worker.run().instrument(span));

        Self {
            target_id,
            cancel,
            state,
            join,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once the worker reached `Stopped` (or its task ended abnormally).
    pub fn is_stopped(&self) -> bool {
        self.state() == WorkerState::Stopped || self.join.is_finished()
    }

    /// Wait for the worker task to end.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            tracing::warn!(target_id = %self.target_id, error = %e, "worker task failed");
        }
    }
}

struct StatsWorker {
    target_id: String,
    ctx: WorkerContext,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
}

impl StatsWorker {
    fn set_state(&self, s: WorkerState) {
        self.state.store(s as u8, Ordering::Release);
    }

    async fn run(self) {
        // ---- starting
        let resolved = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            res = self.ctx.runtime.get_target(&self.target_id) => Some(res),
        };
        let target = match resolved {
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                tracing::warn!(error = %e, kind = e.kind().as_str(), "target not resolvable, worker exits");
                self.set_state(WorkerState::Stopped);
                return;
            }
            None => {
                self.set_state(WorkerState::Stopped);
                return;
            }
        };
        let labels = self.ctx.schema.label_set(&target);
        tracing::info!(name = %target.name, "worker started");

        // ---- streaming
        self.set_state(WorkerState::Streaming);
        let mut stats = self.ctx.runtime.stats(&self.target_id);
        let mut previous: Option<RawStats> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = stats.next() => next,
            };

            match next {
                Some(Ok(current)) => {
                    tracing::debug!(snapshot = ?current, "stats snapshot");
                    if let Some(prev) = previous.as_ref() {
                        if is_counter_reset(&current, prev) {
                            tracing::debug!("cpu counters went backwards, rates reset to 0");
                        }
                    }
                    let derived = derive(&current, previous.as_ref());
                    self.publish(&labels, &derived);
                    // a snapshot without cpu counters keeps the last usable baseline
                    if has_cpu_counters(&current) {
                        previous = Some(current);
                    }
                }
                Some(Err(e)) if e.kind() == ErrorKind::NotFound => {
                    tracing::info!(error = %e, "target vanished");
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, kind = e.kind().as_str(), "stats observation failed");
                }
                None => {
                    tracing::info!("stats stream ended");
                    break;
                }
            }
        }
        // dropping the stream closes the engine connection
        drop(stats);

        // ---- stopping
        self.set_state(WorkerState::Stopping);
        self.publish_zeros(&labels);
        self.set_state(WorkerState::Stopped);
        tracing::info!(name = %target.name, "worker stopped");
    }

    fn publish(&self, labels: &LabelSet, d: &Derived) {
        let reg = &self.ctx.registry;

        self.report("pids", reg.set("pids", labels, &[], d.pids));
        for (component, rate) in d.cpu {
            self.report(component.metric(), reg.set(component.metric(), labels, &[], rate));
        }
        self.report("memory_usage", reg.set("memory_usage", labels, &[], d.memory_usage));
        self.report(
            "memory_usage_max",
            reg.set("memory_usage_max", labels, &[], d.memory_max_usage),
        );
        self.report("memory_limit", reg.set("memory_limit", labels, &[], d.memory_limit));

        for net in &d.networks {
            let name = format!("net_{}", net.counter);
            let extra = [("network_interface", net.interface.as_str())];
            self.report(&name, reg.set(&name, labels, &extra, net.value));
        }

        for (metric, totals) in [("blkio_bytes", &d.blkio_bytes), ("blkio_ops", &d.blkio_ops)] {
            for (class, value) in totals.iter() {
                self.report(metric, reg.set(metric, labels, &[("operation", class)], value as f64));
            }
        }
    }

    fn publish_zeros(&self, labels: &LabelSet) {
        for metric in HEADLINE_METRICS {
            self.report(metric, self.ctx.registry.set(metric, labels, &[], 0.0));
        }
    }

    fn report(&self, metric: &str, res: Result<()>) {
        if let Err(e) = res {
            tracing::error!(metric, error = %e, kind = e.kind().as_str(), "publish failed");
        }
    }
}
