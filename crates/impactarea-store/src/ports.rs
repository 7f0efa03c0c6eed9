use async_trait::async_trait;
use impactarea_core::error::Result;
use impactarea_core::models::CloudStorageProvider;

/// Port for the object storage an exported store is written to
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Provider backing this store
    fn provider(&self) -> CloudStorageProvider;

    /// Write an object, replacing any existing one
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Read an object; a missing key is a `Storage` error
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Public location of a key (e.g. `s3://bucket/key`)
    fn uri_for(&self, key: &str) -> String;
}
