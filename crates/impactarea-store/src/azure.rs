//! Azure Blob Storage object store over the Blob REST API with a SAS credential

use async_trait::async_trait;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::CloudStorageProvider;

use crate::ports::ObjectStore;

const API_VERSION: &str = "2021-08-06";

/// Objects are block blobs in one container
pub struct AzureBlobStore {
    endpoint: String,
    container: String,
    sas: String,
    client: reqwest::Client,
}

fn storage_error(reason: impl Into<String>) -> ImpactError {
    ImpactError::storage(CloudStorageProvider::AzureBlobStorage.label(), reason)
}

impl AzureBlobStore {
    /// `sas` is the SAS query string, with or without the leading `?`
    pub fn new(account: &str, container: impl Into<String>, sas: &str) -> Self {
        Self::with_endpoint(format!("https://{}.blob.core.windows.net", account), container, sas)
    }

    /// Custom service endpoint, e.g. an emulator
    pub fn with_endpoint(endpoint: impl Into<String>, container: impl Into<String>, sas: &str) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            container: container.into(),
            sas: sas.trim_start_matches('?').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn signed_url(&self, key: &str) -> String {
        format!("{}?{}", self.uri_for(key), self.sas)
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    fn provider(&self) -> CloudStorageProvider {
        CloudStorageProvider::AzureBlobStorage
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .put(self.signed_url(key))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .body(bytes)
            .send()
            .await
            .map_err(|e| storage_error(format!("put {}: {}", key, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(storage_error(format!("put {} returned {}: {}", key, status, error_text)));
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.signed_url(key))
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|e| storage_error(format!("get {}: {}", key, e)))?;

        if !response.status().is_success() {
            return Err(storage_error(format!("get {} returned {}", key, response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| storage_error(format!("read {}: {}", key, e)))?;
        Ok(bytes.to_vec())
    }

    fn uri_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.container, key)
    }
}
