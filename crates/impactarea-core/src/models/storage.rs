use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImpactError;

/// Where exported stores are uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CloudStorageProvider {
    #[default]
    #[serde(rename = "AWS_S3")]
    AwsS3,
    #[serde(rename = "AZURE_BLOB_STORAGE")]
    AzureBlobStorage,
    /// Local filesystem, for development
    #[serde(rename = "LOCAL")]
    Local,
}

impl CloudStorageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudStorageProvider::AwsS3 => "AWS_S3",
            CloudStorageProvider::AzureBlobStorage => "AZURE_BLOB_STORAGE",
            CloudStorageProvider::Local => "LOCAL",
        }
    }

    /// Human name used in messages
    pub fn label(&self) -> &'static str {
        match self {
            CloudStorageProvider::AwsS3 => "AWS S3",
            CloudStorageProvider::AzureBlobStorage => "Azure Blob Storage",
            CloudStorageProvider::Local => "local filesystem",
        }
    }
}

impl fmt::Display for CloudStorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudStorageProvider {
    type Err = ImpactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AWS_S3" | "AWS" | "S3" => Ok(CloudStorageProvider::AwsS3),
            "AZURE_BLOB_STORAGE" | "AZURE" => Ok(CloudStorageProvider::AzureBlobStorage),
            "LOCAL" => Ok(CloudStorageProvider::Local),
            _ => Err(ImpactError::invalid_input(
                "cloud_storage_provider",
                format!("'{}' is not one of AWS_S3, AZURE_BLOB_STORAGE, LOCAL", s),
            )),
        }
    }
}

/// A store that has been written to its provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedArtifact {
    pub uri: String,
    pub provider: CloudStorageProvider,
    pub entity_id: Option<String>,
    pub store_name: String,
    /// Bytes written to the provider
    pub bytes: u64,
}
