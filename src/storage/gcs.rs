use anyhow::{Context, Result};
use async_trait::async_trait;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::{
        objects::{
            delete::DeleteObjectRequest,
            download::Range,
            get::GetObjectRequest,
            upload::{Media, UploadObjectRequest, UploadType},
        },
        Error as GcsError,
    },
};
use tracing::{debug, info};

use super::{object_uri, ObjectStore};

const NOT_FOUND: u16 = 404;
const PRECONDITION_FAILED: u16 = 412;

/// Google Cloud Storage backend, authenticated through ADC.
pub struct GcsStore {
    client: Client,
}

impl GcsStore {
    pub async fn connect() -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .context("authenticating to GCS")?;
        Ok(Self::new(Client::new(config)))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// HTTP status behind a GCS error, when there is one.
fn status_code(err: &GcsError) -> Option<u16> {
    match err {
        GcsError::Response(resp) => Some(resp.code),
        GcsError::HttpClient(e) => e.status().map(|s| s.as_u16()),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: name.to_string(),
            ..Default::default()
        };
        let data = self
            .client
            .download_object(&req, &Range::default())
            .await
            .with_context(|| format!("downloading {}", object_uri(bucket, name)))?;
        debug!(bytes = data.len(), "downloaded {}", object_uri(bucket, name));
        Ok(data)
    }

    async fn exists(&self, bucket: &str, name: &str) -> Result<bool> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: name.to_string(),
            ..Default::default()
        };
        match self.client.get_object(&req).await {
            Ok(_) => Ok(true),
            Err(e) if status_code(&e) == Some(NOT_FOUND) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("checking {}", object_uri(bucket, name))),
        }
    }

    async fn upload(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<()> {
        let len = data.len();
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        let upload_type = UploadType::Simple(Media::new(name.to_string()));
        self.client
            .upload_object(&req, data, &upload_type)
            .await
            .with_context(|| format!("uploading {}", object_uri(bucket, name)))?;
        info!(bytes = len, "uploaded {}", object_uri(bucket, name));
        Ok(())
    }

    async fn create(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<bool> {
        // generation 0 matches only when no live object exists
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            if_generation_match: Some(0),
            ..Default::default()
        };
        let upload_type = UploadType::Simple(Media::new(name.to_string()));
        match self.client.upload_object(&req, data, &upload_type).await {
            Ok(_) => Ok(true),
            Err(e) if status_code(&e) == Some(PRECONDITION_FAILED) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("creating {}", object_uri(bucket, name))),
        }
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        let req = DeleteObjectRequest {
            bucket: bucket.to_string(),
            object: name.to_string(),
            ..Default::default()
        };
        match self.client.delete_object(&req).await {
            Ok(()) => Ok(()),
            Err(e) if status_code(&e) == Some(NOT_FOUND) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}", object_uri(bucket, name))),
        }
    }
}
