//! The project document: a full snapshot of the editable scene.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EnvironmentSettings, RenderSettings, SerializedEntityData};
use crate::IpcError;

/// Document version written by this editor.
pub const PROJECT_VERSION: &str = "1.0";

/// File extension for saved projects.
pub const PROJECT_EXTENSION: &str = "mud";

/// One render of the composed scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectData {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub entities: Vec<SerializedEntityData>,
    #[serde(default)]
    pub environment: EnvironmentSettings,
    #[serde(default)]
    pub render_settings: RenderSettings,
    #[serde(default)]
    pub render_logs: Vec<RenderLog>,
    /// Animation timeline; kept as-is, the editor core does not interpret it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<serde_json::Value>,
}

impl Default for ProjectData {
    fn default() -> Self {
        Self {
            version: PROJECT_VERSION.to_string(),
            timestamp: Utc::now(),
            entities: Vec::new(),
            environment: EnvironmentSettings::default(),
            render_settings: RenderSettings::default(),
            render_logs: Vec::new(),
            timeline: None,
        }
    }
}

impl ProjectData {
    pub fn to_json(&self) -> Result<String, IpcError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, IpcError> {
        let data: Self = serde_json::from_str(json)?;
        if data.version.is_empty() {
            return Err(IpcError::MissingVersion);
        }
        Ok(data)
    }

    /// Major component of the version string
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.parse().ok()
    }
}
