//! FileStore collaborator: where generated and imported assets live.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("url {0} does not belong to this store")]
    InvalidUrl(String),
}

/// Byte storage addressed by URL strings
#[allow(async_fn_in_trait)]
pub trait FileStore {
    /// Store bytes under a name and return the URL they can be read back from
    async fn save(&self, bytes: &[u8], name: &str) -> Result<String, StoreError>;

    async fn read(&self, url: &str) -> Result<Vec<u8>, StoreError>;

    fn storage_root(&self) -> PathBuf;
}

const MEMORY_SCHEME: &str = "mem://";

/// In-process store; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an asset under an exact URL
    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(url.into(), bytes.into());
        }
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileStore for MemoryFileStore {
    async fn save(&self, bytes: &[u8], name: &str) -> Result<String, StoreError> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| StoreError::NotFound(name.to_string()))?;
        let url = format!("{MEMORY_SCHEME}{}/{}", files.len() + 1, sanitize_name(name));
        files.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(url).cloned())
            .ok_or_else(|| StoreError::NotFound(url.to_string()))
    }

    fn storage_root(&self) -> PathBuf {
        PathBuf::from(MEMORY_SCHEME)
    }
}

/// Store rooted at a directory on the local filesystem.
///
/// Saved assets are returned as paths under the root; relative URLs given to
/// `read` are resolved against the root as well.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, StoreError> {
        if url.contains("://") && !url.starts_with("file://") {
            return Err(StoreError::InvalidUrl(url.to_string()));
        }
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.root.join(path))
        }
    }
}

impl FileStore for LocalFileStore {
    async fn save(&self, bytes: &[u8], name: &str) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::Io {
                path: self.root.display().to_string(),
                source,
            })?;

        let file_name = format!("{}-{}", short_id(), sanitize_name(name));
        let path = self.root.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(file_name)
    }

    async fn read(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(url)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(url.to_string()))
            }
            Err(source) => Err(StoreError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn storage_root(&self) -> PathBuf {
        self.root.clone()
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryFileStore::new();
        let url = store.save(b"hello", "greeting.txt").await.unwrap();
        assert!(url.starts_with("mem://"));
        assert_eq!(store.read(&url).await.unwrap(), b"hello");
        assert!(matches!(
            store.read("mem://missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_contents() {
        let store = MemoryFileStore::new();
        let other = store.clone();
        store.insert("mem://seeded.glb", b"glTF".to_vec());
        assert_eq!(other.read("mem://seeded.glb").await.unwrap(), b"glTF");
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn test_local_store_saves_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("assets"));

        let url = store.save(b"png-bytes", "my image.png").await.unwrap();
        assert!(url.ends_with("my_image.png"));
        assert!(dir.path().join("assets").join(&url).exists());
        assert_eq!(store.read(&url).await.unwrap(), b"png-bytes");
        assert_eq!(store.storage_root(), dir.path().join("assets"));
    }

    #[tokio::test]
    async fn test_local_store_rejects_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(matches!(
            store.read("mem://1/a.png").await,
            Err(StoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            store.read("missing.glb").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
