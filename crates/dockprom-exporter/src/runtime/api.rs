//! Docker Engine API response bodies used by the runtime client.

use std::collections::BTreeMap;

use serde::Deserialize;

use dockprom_core::stats::Target;

/// One entry of `GET /containers/json`.
#[derive(Debug, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "Labels", default)]
    pub labels: Option<BTreeMap<String, String>>,
}

impl From<ContainerSummary> for Target {
    fn from(c: ContainerSummary) -> Self {
        let name = c.names.first().cloned().unwrap_or_else(|| c.id.clone());
        Target::new(c.id, name, c.labels.unwrap_or_default())
    }
}

/// `GET /containers/{id}/json` (only the fields we read).
#[derive(Debug, Deserialize)]
pub struct ContainerInspect {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Config", default)]
    pub config: Option<InspectConfig>,
    #[serde(rename = "State", default)]
    pub state: Option<InspectState>,
}

#[derive(Debug, Deserialize)]
pub struct InspectConfig {
    #[serde(rename = "Labels", default)]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct InspectState {
    #[serde(rename = "Running", default)]
    pub running: bool,
}

impl ContainerInspect {
    pub fn is_running(&self) -> bool {
        self.state.as_ref().map(|s| s.running).unwrap_or(false)
    }

    pub fn into_target(self) -> Target {
        let labels = self.config.and_then(|c| c.labels).unwrap_or_default();
        Target::new(self.id, self.name, labels)
    }
}

/// Error body returned by the engine on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct EngineError {
    #[serde(default)]
    pub message: String,
}
