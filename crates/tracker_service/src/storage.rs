use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as S3Client;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// Where attachment bytes live. Keys are produced by the service
/// (`{activity_id}/{attachment_id}.{ext}`), never taken from callers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub async fn from_config(storage: &StorageConfig) -> Result<Box<dyn BlobStore>> {
    Ok(match storage {
        StorageConfig::Local { root } => Box::new(LocalBlobStore::new(root.clone())),
        StorageConfig::S3 { endpoint, bucket, region } => {
            Box::new(S3BlobStore::connect(endpoint.as_deref(), region, bucket).await)
        }
    })
}

// ---------------------------------------------------------------------------
// Local filesystem
// ---------------------------------------------------------------------------
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(Error::Storage(format!("invalid blob key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        // Written aside and renamed so readers never see a partial file.
        let staging = path.with_extension("part");
        tokio::fs::write(&staging, &bytes).await.map_err(storage_error)?;
        tokio::fs::rename(&staging, &path).await.map_err(storage_error)?;
        debug!(key, size = bytes.len(), "blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("blob {}", key)),
            _ => storage_error(e),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

fn storage_error(err: std::io::Error) -> Error {
    Error::Storage(err.to_string())
}

// ---------------------------------------------------------------------------
// S3 (or any S3-compatible endpoint such as MinIO)
// ---------------------------------------------------------------------------
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    bucket_ready: OnceCell<()>,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            bucket_ready: OnceCell::new(),
        }
    }

    /// Builds a path-style client; `endpoint` points at MinIO or another
    /// S3-compatible server when set.
    pub async fn connect(endpoint: Option<&str>, region: &str, bucket: &str) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else(Region::new(region.to_string()));
        let aws_cfg = aws_config::from_env().region(region_provider).load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_cfg).force_path_style(true);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self::new(S3Client::from_conf(builder.build()), bucket)
    }

    /// Creates the bucket on first use.
    async fn ensure_bucket(&self) -> Result<()> {
        self.bucket_ready
            .get_or_try_init(|| async {
                if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
                    return Ok(());
                }
                info!(bucket = %self.bucket, "creating attachment bucket");
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| Error::Storage(format!("{}", DisplayErrorContext(&e))))?;
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.ensure_bucket().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("{}", DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.ensure_bucket().await?;
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e.as_service_error().is_some_and(|s| s.is_no_such_key());
                if not_found {
                    Error::NotFound(format!("blob {}", key))
                } else {
                    Error::Storage(format!("{}", DisplayErrorContext(&e)))
                }
            })?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_bucket().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("{}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}
