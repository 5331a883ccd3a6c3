//! Metric registry: lazily created, cached gauges sharing the base label keys.
//!
//! The first `get_or_create` for a metric name fixes its label keys (base
//! labels followed by the extra keys supplied at that call). Later calls must
//! supply the same extra keys; anything else is a `LabelMismatch` surfaced to
//! the caller rather than silently creating a second shape.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use dockprom_core::error::{DockpromError, Result};
use dockprom_core::labels::{sanitize_metric_name, LabelSchema, LabelSet};

use super::exposition::{Exposition, Gauge};

pub struct MetricRegistry {
    prefix: String,
    base_keys: Vec<String>,
    exposition: Arc<Exposition>,
    cache: DashMap<String, Arc<Gauge>>,
}

impl MetricRegistry {
    pub fn new(prefix: impl Into<String>, schema: &LabelSchema, exposition: Arc<Exposition>) -> Self {
        Self {
            prefix: prefix.into(),
            base_keys: schema.keys(),
            exposition,
            cache: DashMap::new(),
        }
    }

    pub fn exposition(&self) -> &Arc<Exposition> {
        &self.exposition
    }

    pub fn base_keys(&self) -> &[String] {
        &self.base_keys
    }

    /// Full exposition name for a metric suffix.
    pub fn full_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, sanitize_metric_name(name))
    }

    /// Fetch the cached gauge for `name`, registering it on first use.
    pub fn get_or_create(&self, name: &str, extra_keys: &[&str]) -> Result<Arc<Gauge>> {
        if let Some(g) = self.cache.get(name) {
            self.check_keys(&g, extra_keys)?;
            return Ok(g.value().clone());
        }

        match self.cache.entry(name.to_string()) {
            Entry::Occupied(e) => {
                self.check_keys(e.get(), extra_keys)?;
                Ok(e.get().clone())
            }
            Entry::Vacant(e) => {
                let keys: Vec<String> = self
                    .base_keys
                    .iter()
                    .cloned()
                    .chain(extra_keys.iter().map(|k| k.to_string()))
                    .collect();
                let gauge = self.exposition.register_gauge(&self.full_name(name), name, &keys)?;
                e.insert(gauge.clone());
                Ok(gauge)
            }
        }
    }

    /// Set the value for a target's label set plus extra labels on an existing gauge.
    pub fn publish(&self, gauge: &Gauge, labels: &LabelSet, extra: &[(&str, &str)], value: f64) -> Result<()> {
        gauge.set(&labels.with_extra(extra), value)
    }

    /// `get_or_create` followed by `publish`; extra label keys come from `extra`.
    pub fn set(&self, name: &str, labels: &LabelSet, extra: &[(&str, &str)], value: f64) -> Result<()> {
        let keys: Vec<&str> = extra.iter().map(|(k, _)| *k).collect();
        let gauge = self.get_or_create(name, &keys)?;
        self.publish(&gauge, labels, extra, value)
    }

    /// Last value published for a series, if any.
    pub fn read(&self, name: &str, labels: &LabelSet, extra: &[(&str, &str)]) -> Option<f64> {
        let gauge = self.cache.get(name)?.value().clone();
        gauge.get(&labels.with_extra(extra))
    }

    fn check_keys(&self, gauge: &Gauge, extra_keys: &[&str]) -> Result<()> {
        let mut expected: Vec<&str> = gauge.label_keys().iter().map(String::as_str).collect();
        let mut got: Vec<&str> = self
            .base_keys
            .iter()
            .map(String::as_str)
            .chain(extra_keys.iter().copied())
            .collect();
        expected.sort_unstable();
        got.sort_unstable();

        if expected != got {
            return Err(DockpromError::LabelMismatch {
                metric: gauge.name().to_string(),
                expected: gauge.label_keys().to_vec(),
                got: got.into_iter().map(str::to_string).collect(),
            });
        }
        Ok(())
    }
}
