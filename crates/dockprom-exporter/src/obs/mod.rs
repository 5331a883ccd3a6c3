//! In-process metrics: the exposition sink and the metric registry on top of it.
//!
//! Gauges are stored as atomics keyed by label values and rendered in the
//! Prometheus text format by the `/metrics` handler.

pub mod exposition;
pub mod registry;

pub use exposition::{Exposition, Gauge};
pub use registry::MetricRegistry;
