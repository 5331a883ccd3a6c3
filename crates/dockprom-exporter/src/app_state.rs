//! Shared application state for the exporter.
//!
//! Owns the exposition sink, the metric registry and the supervisor. Built
//! once at startup; startup errors are returned, not panicked on.

use std::sync::Arc;

use dockprom_core::error::Result;

use crate::config::ExporterConfig;
use crate::obs::{Exposition, MetricRegistry};
use crate::runtime::ContainerRuntime;
use crate::supervisor::Supervisor;
use crate::worker::WorkerContext;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    supervisor: Arc<Supervisor>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    exposition: Arc<Exposition>,
    registry: Arc<MetricRegistry>,
}

impl AppState {
    pub fn new(cfg: ExporterConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let schema = Arc::new(cfg.label_schema()?);
        let exposition = Arc::new(Exposition::new());
        let registry = Arc::new(MetricRegistry::new(
            cfg.stats_prefix.clone(),
            &schema,
            Arc::clone(&exposition),
        ));

        let ctx = WorkerContext {
            runtime,
            registry: Arc::clone(&registry),
            schema,
        };
        let supervisor = Arc::new(Supervisor::new(&cfg, ctx)?);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                exposition,
                registry,
            }),
            supervisor,
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn exposition(&self) -> Arc<Exposition> {
        Arc::clone(&self.inner.exposition)
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn supervisor(&self) -> Arc<Supervisor> {
        Arc::clone(&self.supervisor)
    }
}
