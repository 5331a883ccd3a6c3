use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use dockprom_core::error::{DockpromError, Result};
use dockprom_core::labels::{is_valid_metric_name, parse_label_list, LabelSchema};

/// How a worker obtains snapshots from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatsMode {
    /// One long-lived `stats?stream=true` response per target.
    #[default]
    Stream,
    /// One `stats?stream=false` request per refresh interval.
    Poll,
}

impl FromStr for StatsMode {
    type Err = DockpromError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(StatsMode::Stream),
            "poll" => Ok(StatsMode::Poll),
            other => Err(DockpromError::Config(format!(
                "STATS_MODE must be `stream` or `poll`, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default = "default_monitor_label")]
    pub monitor_label: String,

    #[serde(default = "default_stats_prefix")]
    pub stats_prefix: String,

    #[serde(default)]
    pub expose_labels: Vec<String>,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_docker_host")]
    pub docker_host: String,

    #[serde(default)]
    pub stats_mode: StatsMode,

    /// Consecutive discovery failures before the exporter gives up; 0 never gives up.
    #[serde(default)]
    pub max_discovery_failures: u32,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            monitor_label: default_monitor_label(),
            stats_prefix: default_stats_prefix(),
            expose_labels: Vec::new(),
            refresh_interval_secs: default_refresh_interval_secs(),
            listen_addr: default_listen_addr(),
            port: default_port(),
            docker_host: default_docker_host(),
            stats_mode: StatsMode::default(),
            max_discovery_failures: 0,
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(DockpromError::Config(format!("unsupported config version {}", self.version)));
        }
        if self.monitor_label.trim().is_empty() {
            return Err(DockpromError::Config("monitor_label must not be empty".into()));
        }
        if !is_valid_metric_name(&self.stats_prefix) {
            return Err(DockpromError::Config(format!(
                "stats_prefix {:?} is not a valid metric name prefix",
                self.stats_prefix
            )));
        }
        if !(1..=3600).contains(&self.refresh_interval_secs) {
            return Err(DockpromError::Config(
                "refresh_interval_secs must be between 1 and 3600".into(),
            ));
        }
        if self.port == 0 {
            return Err(DockpromError::Config("port must not be 0".into()));
        }
        if !(self.docker_host.starts_with("unix://") || self.docker_host.starts_with("tcp://")) {
            return Err(DockpromError::Config(format!(
                "docker_host {:?} must start with unix:// or tcp://",
                self.docker_host
            )));
        }
        self.listen()?;
        self.label_schema()?;
        Ok(())
    }

    /// Override fields from environment variables.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        if let Some(v) = vars.get("MONITOR_LABEL") {
            self.monitor_label = v.trim().to_string();
        }
        if let Some(v) = vars.get("STATS_PREFIX") {
            self.stats_prefix = v.trim().to_string();
        }
        if let Some(v) = vars.get("EXPOSE_LABELS") {
            self.expose_labels = parse_label_list(v);
        }
        if let Some(v) = vars.get("REFRESH_INTERVAL") {
            self.refresh_interval_secs = parse_num("REFRESH_INTERVAL", v)?;
        }
        if let Some(v) = vars.get("EXPORTER_LISTEN") {
            self.listen_addr = v.trim().to_string();
        }
        if let Some(v) = vars.get("EXPORTER_PORT") {
            self.port = parse_num("EXPORTER_PORT", v)?;
        }
        if let Some(v) = vars.get("DOCKER_HOST") {
            self.docker_host = v.trim().to_string();
        }
        if let Some(v) = vars.get("STATS_MODE") {
            self.stats_mode = v.parse()?;
        }
        if let Some(v) = vars.get("MAX_DISCOVERY_FAILURES") {
            self.max_discovery_failures = parse_num("MAX_DISCOVERY_FAILURES", v)?;
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Address the metrics endpoint binds.
    pub fn listen(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_addr
            .parse()
            .map_err(|e| DockpromError::Config(format!("listen_addr {:?}: {e}", self.listen_addr)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Exposed-label mapping shared by the registry and workers.
    pub fn label_schema(&self) -> Result<LabelSchema> {
        LabelSchema::new(&self.expose_labels)
    }
}

fn parse_num<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| DockpromError::Config(format!("{key}={raw:?}: {e}")))
}

fn default_monitor_label() -> String {
    "be.vbgn.prometheus-docker-exporter".into()
}
fn default_stats_prefix() -> String {
    "docker_container_".into()
}
fn default_refresh_interval_secs() -> u64 {
    10
}
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_docker_host() -> String {
    "unix:///var/run/docker.sock".into()
}
