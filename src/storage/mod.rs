// src/storage/mod.rs

use anyhow::Result;
use async_trait::async_trait;

pub mod gcs;
pub mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

/// Minimal object-store surface the ingestion handler needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Full contents of `bucket/name`.
    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>>;

    async fn exists(&self, bucket: &str, name: &str) -> Result<bool>;

    /// Unconditional write, replacing any existing object.
    async fn upload(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<()>;

    /// Create-only write. Returns `false` if the object already existed, in
    /// which case nothing was written.
    async fn create(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<bool>;

    /// Remove `bucket/name`. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, name: &str) -> Result<()>;
}

/// `gs://bucket/name`, for logs and load-job source URIs.
pub fn object_uri(bucket: &str, name: &str) -> String {
    format!("gs://{}/{}", bucket, name)
}
