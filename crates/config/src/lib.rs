//! Shared configuration for the mud editor
//!
//! This crate provides the single source of truth for editor limits, default
//! gizmo behavior, and storage/provider locations, plus the persisted
//! key-value store for user preferences (API credentials, UI theme).

mod preferences;

use std::path::PathBuf;

use mud_ipc::GizmoMode;
use serde::{Deserialize, Serialize};

pub use preferences::{
    api_key_name, JsonFilePreferences, MemoryPreferences, Preferences, PreferencesError, THEME_KEY,
};

/// Default number of undoable commands kept in history
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Default gizmo visual size (1.0 = engine default)
pub const DEFAULT_GIZMO_SIZE: f32 = 1.0;

/// Default directory for generated and imported assets
pub const DEFAULT_STORAGE_ROOT: &str = "mud-assets";

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Oldest commands beyond this depth are dropped from undo history
    pub max_history: usize,
    /// Gizmo size used when a selectable gives no hint
    pub gizmo_size: f32,
    /// Mode the gizmo starts in before anything was selected
    pub default_gizmo_mode: GizmoMode,
    /// Root directory of the local file store
    pub storage_root: PathBuf,
    /// WebSocket endpoint of the generation server
    pub generation_server_url: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            gizmo_size: DEFAULT_GIZMO_SIZE,
            default_gizmo_mode: GizmoMode::Position,
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            generation_server_url: None,
        }
    }
}

impl EditorConfig {
    /// Defaults overlaid with MUD_STORAGE_ROOT, MUD_MAX_HISTORY and MUD_GENERATION_URL
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a JSON config file; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("MUD_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(depth) = lookup("MUD_MAX_HISTORY") {
            match depth.parse::<usize>() {
                Ok(depth) if depth > 0 => self.max_history = depth,
                _ => tracing::warn!("Ignoring invalid MUD_MAX_HISTORY value {:?}", depth),
            }
        }
        if let Some(url) = lookup("MUD_GENERATION_URL") {
            self.generation_server_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.max_history, DEFAULT_MAX_HISTORY);
        assert_eq!(config.gizmo_size, DEFAULT_GIZMO_SIZE);
        assert_eq!(config.default_gizmo_mode, GizmoMode::Position);
        assert!(config.generation_server_url.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EditorConfig::default();
        config.apply_env(|key| match key {
            "MUD_STORAGE_ROOT" => Some("/tmp/assets".to_string()),
            "MUD_MAX_HISTORY" => Some("12".to_string()),
            "MUD_GENERATION_URL" => Some("ws://localhost:8188".to_string()),
            _ => None,
        });
        assert_eq!(config.storage_root, PathBuf::from("/tmp/assets"));
        assert_eq!(config.max_history, 12);
        assert_eq!(config.generation_server_url.as_deref(), Some("ws://localhost:8188"));
    }

    #[test]
    fn test_invalid_history_depth_ignored() {
        let mut config = EditorConfig::default();
        config.apply_env(|key| (key == "MUD_MAX_HISTORY").then(|| "0".to_string()));
        assert_eq!(config.max_history, DEFAULT_MAX_HISTORY);
    }

    #[test]
    fn test_partial_json_config() {
        let config = EditorConfig::from_json_str(r#"{"max_history": 5}"#).unwrap();
        assert_eq!(config.max_history, 5);
        assert_eq!(config.storage_root, PathBuf::from(DEFAULT_STORAGE_ROOT));
    }
}
