//! Writes impact results as chunked array stores

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::{ExportedArtifact, ImpactResult, ImpactSummary};
use impactarea_core::TransferMeter;

use crate::local::LocalStore;
use crate::ports::ObjectStore;
use crate::zarr::{self, StoredImpact};

pub const DEFAULT_CHUNK_SIZE: usize = 256;

const STORE_SUFFIX: &str = "impacted-area-datacube.zarr";

/// `[<entity_id>_]<YYYY-mm-dd_HH-MM-SS>_impacted-area-datacube.zarr`
pub fn store_name(entity_id: Option<&str>, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%d_%H-%M-%S");
    match entity_id.map(str::trim).filter(|e| !e.is_empty()) {
        Some(entity) => format!("{}_{}_{}", entity, stamp, STORE_SUFFIX),
        None => format!("{}_{}", stamp, STORE_SUFFIX),
    }
}

/// Uploads stores to one object store
pub struct Exporter {
    store: Arc<dyn ObjectStore>,
    chunk_size: usize,
    meter: TransferMeter,
    local_copy: Option<LocalStore>,
}

impl Exporter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
            meter: TransferMeter::new(),
            local_copy: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_meter(mut self, meter: TransferMeter) -> Self {
        self.meter = meter;
        self
    }

    /// Also keep the store on disk below `dir`
    pub fn with_local_copy(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_copy = Some(LocalStore::new(dir));
        self
    }

    /// Encode and upload, returning where the store landed
    pub async fn export(
        &self,
        result: &ImpactResult,
        summary: &ImpactSummary,
        entity_id: Option<&str>,
    ) -> Result<ExportedArtifact> {
        let name = store_name(entity_id, Utc::now());
        let objects = zarr::encode_impact(result, summary, entity_id, self.chunk_size)?;
        let bytes: u64 = objects.values().map(|b| b.len() as u64).sum();

        tracing::info!(
            store = %name,
            provider = %self.store.provider(),
            objects = objects.len(),
            bytes,
            "Uploading impacted area store"
        );

        if let Some(local) = &self.local_copy {
            try_join_all(objects.iter().map(|(key, data)| {
                let key = format!("{}/{}", name, key);
                async move { local.put_object(&key, data.clone()).await }
            }))
            .await?;
            tracing::debug!(path = %local.root().join(&name).display(), "Kept local copy");
        }

        try_join_all(objects.into_iter().map(|(key, data)| {
            let key = format!("{}/{}", name, key);
            let len = data.len() as u64;
            async move {
                self.store.put_object(&key, data).await?;
                self.meter.record_upload(len);
                Ok::<_, ImpactError>(())
            }
        }))
        .await?;

        Ok(ExportedArtifact {
            uri: self.store.uri_for(&name),
            provider: self.store.provider(),
            entity_id: entity_id.map(str::to_string),
            store_name: name,
            bytes,
        })
    }

    /// Read a previously exported store back
    pub async fn load(&self, store_name: &str) -> Result<StoredImpact> {
        let mut objects = HashMap::new();
        self.fetch_into(store_name, zarr::metadata_keys(), &mut objects).await?;
        let chunk_keys = zarr::chunk_keys(&objects)?;
        self.fetch_into(store_name, chunk_keys, &mut objects).await?;
        zarr::decode_impact(&objects)
    }

    async fn fetch_into(
        &self,
        store_name: &str,
        keys: Vec<String>,
        objects: &mut HashMap<String, Vec<u8>>,
    ) -> Result<()> {
        let fetched = try_join_all(keys.into_iter().map(|key| async move {
            let bytes = self.store.get_object(&format!("{}/{}", store_name, key)).await?;
            self.meter.record_download(bytes.len() as u64);
            Ok::<_, ImpactError>((key, bytes))
        }))
        .await?;
        objects.extend(fetched);
        Ok(())
    }
}
