//! # Blob Store Backend
//!
//! Opaque key/value byte store holding object contents. Backed by
//! `object_store`, so the same code drives memory, local disk and S3/MinIO.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath,
    ObjectStore,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::errors::{StorageError, StorageResult};

/// Byte stream of one blob. Dropping it releases the underlying handle.
pub type BlobStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// A listed blob
#[derive(Debug, Clone, PartialEq)]
pub struct BlobEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Backend trait for blob storage
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Write `data` under `key`, replacing anything there
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Open `key` for streaming; `NotFound` if absent
    async fn get(&self, key: &str) -> StorageResult<BlobStream>;

    /// Delete `key`; `NotFound` if absent
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if `key` exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// List every blob
    async fn list(&self) -> StorageResult<Vec<BlobEntry>>;
}

/// Which `object_store` implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackendKind {
    Memory,
    #[default]
    Local,
    S3,
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    #[serde(default)]
    pub backend: BlobBackendKind,

    /// Root directory for the local backend
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Bucket for the S3 backend
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Custom endpoint (MinIO); empty means AWS
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Permit plain-HTTP endpoints
    #[serde(default)]
    pub allow_http: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("./filevault-blobs")
}

fn default_bucket() -> String {
    "uploads".to_string()
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackendKind::default(),
            root: default_root(),
            bucket: default_bucket(),
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            allow_http: false,
        }
    }
}

impl BlobStoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: BlobBackendKind::Memory,
            ..Default::default()
        }
    }

    pub fn local(root: PathBuf) -> Self {
        Self {
            backend: BlobBackendKind::Local,
            root,
            ..Default::default()
        }
    }
}

/// `BlobStore` over any `object_store::ObjectStore`
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Build the backend described by `config`
    pub fn from_config(config: &BlobStoreConfig) -> StorageResult<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            BlobBackendKind::Memory => Arc::new(InMemory::new()),
            BlobBackendKind::Local => {
                std::fs::create_dir_all(&config.root).map_err(|e| {
                    StorageError::BackendUnavailable(format!(
                        "cannot create blob root {}: {}",
                        config.root.display(),
                        e
                    ))
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(&config.root)?)
            }
            BlobBackendKind::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&config.bucket)
                    .with_allow_http(config.allow_http);

                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(key) = &config.access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &config.secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }

                Arc::new(builder.build().map_err(|e| {
                    StorageError::BackendUnavailable(format!("failed to build S3 store: {}", e))
                })?)
            }
        };

        Ok(Self::new(store))
    }

    fn path(key: &str) -> ObjectPath {
        ObjectPath::from(key)
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBackend {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        debug!(key, bytes = data.len(), "blob put");
        self.store.put(&Self::path(key), data.into()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<BlobStream> {
        let result = self.store.get(&Self::path(key)).await?;
        Ok(result
            .into_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = Self::path(key);
        // Some backends treat deleting a missing key as success
        self.store.head(&path).await?;
        self.store.delete(&path).await?;
        debug!(key, "blob deleted");
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.store.head(&Self::path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<BlobEntry>> {
        let metas: Vec<_> = self.store.list(None).try_collect().await?;
        Ok(metas
            .into_iter()
            .map(|meta| BlobEntry {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn read_all(mut stream: BlobStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    fn memory() -> ObjectStoreBackend {
        ObjectStoreBackend::from_config(&BlobStoreConfig::memory()).unwrap()
    }

    #[tokio::test]
    async fn test_write_read() {
        let backend = memory();
        backend.put("k1", Bytes::from_static(b"hello")).await.unwrap();

        let data = read_all(backend.get("k1").await.unwrap()).await;
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = memory();
        backend.put("k1", Bytes::from_static(b"bye")).await.unwrap();
        assert!(backend.exists("k1").await.unwrap());

        backend.delete("k1").await.unwrap();
        assert!(!backend.exists("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found() {
        let backend = memory();
        assert!(matches!(
            backend.get("missing").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            backend.delete("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list() {
        let backend = memory();
        backend.put("a", Bytes::from_static(b"1")).await.unwrap();
        backend.put("b", Bytes::from_static(b"22")).await.unwrap();

        let mut keys: Vec<_> = backend
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.key, e.size))
            .collect();
        keys.sort();
        assert_eq!(keys, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_local_backend() {
        let temp = TempDir::new().unwrap();
        let backend =
            ObjectStoreBackend::from_config(&BlobStoreConfig::local(temp.path().join("blobs")))
                .unwrap();

        backend.put("k1", Bytes::from_static(b"on disk")).await.unwrap();
        assert_eq!(read_all(backend.get("k1").await.unwrap()).await, b"on disk");

        backend.delete("k1").await.unwrap();
        assert!(matches!(
            backend.delete("k1").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: BlobStoreConfig = serde_json::from_str(r#"{"backend":"s3"}"#).unwrap();
        assert_eq!(config.backend, BlobBackendKind::S3);
        assert_eq!(config.bucket, "uploads");
        assert!(!config.allow_http);
    }
}
