//! In-memory object store for development and testing.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::CloudStorageProvider;

use crate::ports::ObjectStore;

/// In-memory implementation of ObjectStore
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

fn poisoned() -> ImpactError {
    ImpactError::storage("memory", "store lock poisoned")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in order
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    /// Reported as local storage
    fn provider(&self) -> CloudStorageProvider {
        CloudStorageProvider::Local
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| ImpactError::storage("memory", format!("object {} not found", key)))
    }

    fn uri_for(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
