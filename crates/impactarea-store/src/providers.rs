//! Provider selection and credential checks

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::CloudStorageProvider;

use crate::azure::AzureBlobStore;
use crate::local::LocalStore;
use crate::ports::ObjectStore;
use crate::s3::S3Store;

const AWS_KEYS: &[&str] = &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"];
const AZURE_KEYS: &[&str] = &[
    "AZURE_ACCOUNT_NAME",
    "AZURE_SAS_CREDENTIAL",
    "AZURE_BLOB_CONTAINER_NAME",
];

/// Settings used when opening a store
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub aws_region: Option<String>,
    /// Root of `LOCAL` stores
    pub output_dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            aws_region: None,
            output_dir: env::temp_dir(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Fail early when the environment lacks the provider's credentials
pub fn check_credentials(provider: CloudStorageProvider) -> Result<()> {
    let required = match provider {
        CloudStorageProvider::AwsS3 => AWS_KEYS,
        CloudStorageProvider::AzureBlobStorage => AZURE_KEYS,
        CloudStorageProvider::Local => return Ok(()),
    };

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| non_empty_env(key).is_none())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    tracing::warn!(provider = %provider, missing = ?missing, "Storage credentials not set");
    Err(ImpactError::MissingCredentials {
        provider: provider.label().to_string(),
    })
}

/// Requested bucket, else `AWS_BUCKET_NAME`
pub fn resolve_bucket(requested: Option<&str>) -> Result<String> {
    requested
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .or_else(|| non_empty_env("AWS_BUCKET_NAME"))
        .ok_or_else(|| ImpactError::ConfigMissing {
            key: "AWS_BUCKET_NAME".to_string(),
        })
}

fn required_env(key: &str, provider: CloudStorageProvider) -> Result<String> {
    non_empty_env(key).ok_or_else(|| ImpactError::MissingCredentials {
        provider: provider.label().to_string(),
    })
}

/// Open the object store of `provider`
///
/// `bucket` is only used by AWS S3.
pub async fn open_store(
    provider: CloudStorageProvider,
    bucket: Option<&str>,
    settings: &StoreSettings,
) -> Result<Arc<dyn ObjectStore>> {
    check_credentials(provider)?;

    let store: Arc<dyn ObjectStore> = match provider {
        CloudStorageProvider::AwsS3 => {
            let bucket = resolve_bucket(bucket)?;
            tracing::debug!(bucket = %bucket, "Opening S3 store");
            Arc::new(S3Store::from_env(bucket, settings.aws_region.clone()).await)
        }
        CloudStorageProvider::AzureBlobStorage => {
            let account = required_env("AZURE_ACCOUNT_NAME", provider)?;
            let container = required_env("AZURE_BLOB_CONTAINER_NAME", provider)?;
            let sas = required_env("AZURE_SAS_CREDENTIAL", provider)?;
            tracing::debug!(account = %account, container = %container, "Opening Azure Blob store");
            Arc::new(AzureBlobStore::new(&account, container, &sas))
        }
        CloudStorageProvider::Local => {
            tracing::debug!(root = %settings.output_dir.display(), "Opening local store");
            Arc::new(LocalStore::new(settings.output_dir.clone()))
        }
    };

    Ok(store)
}
