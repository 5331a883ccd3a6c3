//! dockprom core: runtime-free stats primitives, label helpers, and the error surface.
//!
//! This crate defines the Docker stats wire types, the pure derivation
//! functions that turn cumulative counters into publishable values, and the
//! error type shared with the exporter. It carries no async runtime or HTTP
//! dependencies so the numeric semantics can be tested in isolation.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed snapshots must degrade to zero readings, never crash a worker.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod derive;
pub mod error;
pub mod labels;
pub mod stats;

/// Shared result type.
pub use error::{DockpromError, Result};
