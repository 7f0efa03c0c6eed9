//! Filesystem object store

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::CloudStorageProvider;

use crate::ports::ObjectStore;

/// Objects are files below `root`
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a key; keys may not leave the root
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(storage_error(format!("invalid object key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn storage_error(reason: impl Into<String>) -> ImpactError {
    ImpactError::storage(CloudStorageProvider::Local.label(), reason)
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn provider(&self) -> CloudStorageProvider {
        CloudStorageProvider::Local
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| storage_error(format!("{}: {}", path.display(), e)))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| storage_error(format!("{}: {}", path.display(), e)))
    }

    fn uri_for(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_nested_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store.put_object("cube.zarr/difference/0.0", vec![7, 8]).await.unwrap();
        assert!(dir.path().join("cube.zarr/difference/0.0").is_file());
        assert_eq!(store.get_object("cube.zarr/difference/0.0").await.unwrap(), vec![7, 8]);
        assert!(store.uri_for("cube.zarr").starts_with("file://"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.put_object("../outside", vec![]).await.is_err());
        assert!(store.put_object("/etc/passwd", vec![]).await.is_err());
        assert!(store.get_object("missing").await.is_err());
    }
}
