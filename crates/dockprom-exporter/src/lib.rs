//! dockprom exporter library entry.
//!
//! This crate wires the runtime client, the supervisor and its per-target
//! workers, the metric registry, and the HTTP exposition endpoint into one
//! exporter. It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod runtime;
pub mod supervisor;
pub mod worker;
