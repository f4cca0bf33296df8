//! Persisted user preferences (API credentials, UI theme).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Key under which the UI theme is stored
pub const THEME_KEY: &str = "theme";

/// Errors raised by preference stores
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("failed to access preferences at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("preferences file {path} is not a JSON object: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keyed store for user preferences, persisted outside the editor core.
pub trait Preferences {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), PreferencesError>;

    fn get_all(&self) -> Map<String, Value>;

    /// Drop every stored preference
    fn reset(&mut self) -> Result<(), PreferencesError>;

    /// API key for a generation provider, stored under `api_keys.<provider>`
    fn api_key(&self, provider: &str) -> Option<String> {
        self.get(&api_key_name(provider))
            .and_then(|value| value.as_str().map(str::to_string))
    }
}

pub fn api_key_name(provider: &str) -> String {
    format!("api_keys.{provider}")
}

/// Preferences that live only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: Map<String, Value>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PreferencesError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn get_all(&self) -> Map<String, Value> {
        self.values.clone()
    }

    fn reset(&mut self) -> Result<(), PreferencesError> {
        self.values.clear();
        Ok(())
    }
}

/// Preferences persisted as one JSON object, rewritten on every change.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFilePreferences {
    /// Open (or lazily create) the preferences file; a missing file is empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|source| PreferencesError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => {
                return Err(PreferencesError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        tracing::debug!("Loaded {} preferences from {}", values.len(), path.display());
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), PreferencesError> {
        let io_err = |source| PreferencesError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.values).map_err(|source| {
            PreferencesError::Parse {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

impl Preferences for JsonFilePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PreferencesError> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn get_all(&self) -> Map<String, Value> {
        self.values.clone()
    }

    fn reset(&mut self) -> Result<(), PreferencesError> {
        self.values.clear();
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_preferences() {
        let mut prefs = MemoryPreferences::new();
        prefs.set(THEME_KEY, json!("dark")).unwrap();
        prefs.set(&api_key_name("tripo"), json!("secret")).unwrap();

        assert_eq!(prefs.get(THEME_KEY), Some(json!("dark")));
        assert_eq!(prefs.api_key("tripo").as_deref(), Some("secret"));
        assert_eq!(prefs.get_all().len(), 2);

        prefs.reset().unwrap();
        assert!(prefs.get_all().is_empty());
        assert_eq!(prefs.api_key("tripo"), None);
    }

    #[test]
    fn test_json_preferences_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut prefs = JsonFilePreferences::open(&path).unwrap();
        assert!(prefs.get_all().is_empty());
        prefs.set(THEME_KEY, json!("light")).unwrap();
        drop(prefs);

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get(THEME_KEY), Some(json!("light")));
    }

    #[test]
    fn test_json_preferences_reset_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = JsonFilePreferences::open(&path).unwrap();
        prefs.set("a", json!(1)).unwrap();
        prefs.reset().unwrap();

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert!(reopened.get_all().is_empty());
    }

    #[test]
    fn test_json_preferences_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            JsonFilePreferences::open(&path),
            Err(PreferencesError::Parse { .. })
        ));
    }
}
