//! Top-level facade crate for dockprom.
//!
//! Re-exports the core primitives and the exporter library so users can depend on a single crate.

pub mod core {
    pub use dockprom_core::*;
}

pub mod exporter {
    pub use dockprom_exporter::*;
}
