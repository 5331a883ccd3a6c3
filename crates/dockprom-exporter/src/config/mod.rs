//! Exporter config loader.
//!
//! Defaults, then an optional strict YAML file (`DOCKPROM_CONFIG`), then
//! environment variables. The result is validated once at the end.

pub mod schema;

use std::collections::HashMap;
use std::fs;

use dockprom_core::error::{DockpromError, Result};

pub use schema::{ExporterConfig, StatsMode};

/// Env var naming the optional YAML config file.
pub const CONFIG_PATH_ENV: &str = "DOCKPROM_CONFIG";

pub fn load_from_file(path: &str) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| DockpromError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg: ExporterConfig = serde_yaml::from_str(s)
        .map_err(|e| DockpromError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load from the process environment.
pub fn load() -> Result<ExporterConfig> {
    load_with(std::env::vars())
}

/// Load from an explicit set of variables (the process environment in production).
pub fn load_with<I>(vars: I) -> Result<ExporterConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();

    let mut cfg = match vars.get(CONFIG_PATH_ENV).map(|p| p.trim()) {
        Some(path) if !path.is_empty() => load_from_file(path)?,
        _ => ExporterConfig::default(),
    };
    cfg.apply_env(&vars)?;
    cfg.validate()?;
    Ok(cfg)
}
