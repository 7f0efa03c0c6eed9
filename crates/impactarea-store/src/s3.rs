//! AWS S3 object store

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use impactarea_core::error::{ImpactError, Result};
use impactarea_core::models::CloudStorageProvider;

use crate::ports::ObjectStore;

/// Objects are keys in one bucket
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

fn storage_error(reason: impl Into<String>) -> ImpactError {
    ImpactError::storage(CloudStorageProvider::AwsS3.label(), reason)
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    /// Client from the standard AWS environment (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, ...)
    pub async fn from_env(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        Self::new(Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn provider(&self) -> CloudStorageProvider {
        CloudStorageProvider::AwsS3
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| storage_error(format!("put {}: {}", key, DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error(format!("get {}: {}", key, DisplayErrorContext(&e))))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| storage_error(format!("read {}: {}", key, e)))?;
        Ok(data.into_bytes().to_vec())
    }

    fn uri_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .build();
        let store = S3Store::new(Client::from_conf(config), "impact-bucket");
        assert_eq!(store.uri_for("a.zarr"), "s3://impact-bucket/a.zarr");
        assert_eq!(store.provider(), CloudStorageProvider::AwsS3);
    }
}
