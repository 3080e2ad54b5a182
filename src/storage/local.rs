use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use super::ObjectStore;

/// Filesystem-backed object store: `bucket/name` lives at `<root>/<bucket>/<name>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path, refusing names that would escape the bucket.
    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        for part in [bucket, name] {
            let escapes = Path::new(part)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if part.is_empty() || escapes {
                bail!("invalid object path component {:?}", part);
            }
        }
        Ok(self.root.join(bucket).join(name))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, name)?;
        fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    async fn exists(&self, bucket: &str, name: &str) -> Result<bool> {
        let path = self.object_path(bucket, name)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("checking {}", path.display())),
        }
    }

    async fn upload(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, name)?;
        Self::ensure_parent(&path).await?;
        fs::write(&path, &data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(bytes = data.len(), "wrote {}", path.display());
        Ok(())
    }

    async fn create(&self, bucket: &str, name: &str, data: Vec<u8>) -> Result<bool> {
        let path = self.object_path(bucket, name)?;
        Self::ensure_parent(&path).await?;
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e).with_context(|| format!("creating {}", path.display())),
        };
        file.write_all(&data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        file.flush().await?;
        Ok(true)
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        let path = self.object_path(bucket, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}", path.display())),
        }
    }
}
