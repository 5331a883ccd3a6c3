//! Gauge storage and Prometheus text rendering.
//!
//! A gauge's label keys are fixed when it is registered. Series are keyed by
//! label values in that key order and hold the `f64` bits in an `AtomicU64`,
//! so setting an existing series only takes a shard read lock and never blocks
//! other series.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use dockprom_core::error::{DockpromError, Result};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf".into() } else { "-Inf".into() }
    } else {
        v.to_string()
    }
}

/// A named gauge with a fixed label-key set.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    help: String,
    keys: Vec<String>,
    series: DashMap<Vec<String>, AtomicU64>,
}

impl Gauge {
    fn new(name: &str, help: &str, keys: &[String]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            keys: keys.to_vec(),
            series: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_keys(&self) -> &[String] {
        &self.keys
    }

    /// Overwrite the value of one series (last write wins).
    pub fn set(&self, labels: &[(&str, &str)], value: f64) -> Result<()> {
        let values = self.values_for(labels)?;
        if let Some(slot) = self.series.get(&values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
            return Ok(());
        }
        self.series
            .entry(values)
            .or_insert_with(|| AtomicU64::new(0))
            .store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Current value of one series, if it was ever set.
    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        let values = self.values_for(labels).ok()?;
        self.series
            .get(&values)
            .map(|v| f64::from_bits(v.load(Ordering::Relaxed)))
    }

    /// Number of series ever set.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Order label values by the registered keys. Every key must be supplied exactly once.
    fn values_for(&self, labels: &[(&str, &str)]) -> Result<Vec<String>> {
        let mismatch = || DockpromError::LabelMismatch {
            metric: self.name.clone(),
            expected: self.keys.clone(),
            got: labels.iter().map(|(k, _)| k.to_string()).collect(),
        };

        if labels.len() != self.keys.len() {
            return Err(mismatch());
        }
        self.keys
            .iter()
            .map(|key| {
                labels
                    .iter()
                    .find(|(k, _)| *k == key.as_str())
                    .map(|(_, v)| v.to_string())
                    .ok_or_else(mismatch)
            })
            .collect()
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help));
        let _ = writeln!(out, "# TYPE {} gauge", self.name);

        let mut rows: Vec<(Vec<String>, f64)> = self
            .series
            .iter()
            .map(|r| (r.key().clone(), f64::from_bits(r.value().load(Ordering::Relaxed))))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        for (values, v) in rows {
            if self.keys.is_empty() {
                let _ = writeln!(out, "{} {}", self.name, format_value(v));
                continue;
            }
            let label_str = self
                .keys
                .iter()
                .zip(values.iter())
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "{}{{{}}} {}", self.name, label_str, format_value(v));
        }
    }
}

/// The exposition sink: every registered gauge, rendered on scrape.
#[derive(Default)]
pub struct Exposition {
    gauges: DashMap<String, Arc<Gauge>>,
}

impl Exposition {
    pub fn new() -> Self {
        Self {
            gauges: DashMap::new(),
        }
    }

    /// Register a gauge, or return the existing one when the key set is identical.
    /// A different key set for an existing name is a `LabelMismatch`.
    pub fn register_gauge(&self, name: &str, help: &str, keys: &[String]) -> Result<Arc<Gauge>> {
        let gauge = self
            .gauges
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Gauge::new(name, help, keys)))
            .value()
            .clone();

        if gauge.keys != keys {
            return Err(DockpromError::LabelMismatch {
                metric: name.to_string(),
                expected: gauge.keys.clone(),
                got: keys.to_vec(),
            });
        }
        Ok(gauge)
    }

    pub fn gauge(&self, name: &str) -> Option<Arc<Gauge>> {
        self.gauges.get(name).map(|g| g.value().clone())
    }

    /// Render every gauge, ordered by name.
    pub fn render(&self) -> String {
        let mut gauges: Vec<Arc<Gauge>> = self.gauges.iter().map(|g| g.value().clone()).collect();
        gauges.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        for g in gauges {
            g.render(&mut out);
        }
        out
    }
}
