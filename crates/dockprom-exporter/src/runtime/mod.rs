//! Container runtime collaborator.
//!
//! The supervisor and workers only talk to the runtime through
//! [`ContainerRuntime`]; the Docker Engine client is the production
//! implementation and tests substitute an in-memory one.

pub mod api;
pub mod docker;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use dockprom_core::error::Result;
use dockprom_core::stats::{RawStats, Target};

pub use docker::{DockerRuntime, Endpoint};

/// Lazily produced, potentially infinite sequence of snapshots for one target.
///
/// A `NotFound` item means the target vanished; the stream ends after it.
pub type StatsStream = BoxStream<'static, Result<RawStats>>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Running targets carrying the `marker` label.
    async fn list_targets(&self, marker: &str) -> Result<Vec<Target>>;

    /// Resolve one target; `NotFound` once it stopped or was removed.
    async fn get_target(&self, id: &str) -> Result<Target>;

    /// Snapshots for one target. Polled from the target's own worker task.
    fn stats(&self, id: &str) -> StatsStream;
}
