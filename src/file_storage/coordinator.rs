//! # Storage Coordinator
//!
//! Permission-checked file lifecycle over the metadata store and blob store.
//!
//! ## Ordering
//! - Upload: blob first, then object row + owner grant in one transaction.
//!   A failed metadata write deletes the blob it just wrote.
//! - Delete: blob first, then grants + object row in one transaction. A
//!   failed blob delete leaves metadata untouched.
//! - Download: the permission check and the transfer are separate phases;
//!   no lock is held while bytes stream.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, warn};

use super::backend::{BlobStore, BlobStream};
use super::errors::{StorageError, StorageResult};
use super::metadata::MetadataStore;
use super::object::{validate_filename, NewObject, ObjectSummary, DEFAULT_CONTENT_TYPE};
use super::permissions::Capability;
use super::reconcile::Reconciler;
use crate::auth::Identity;

/// Default upload size cap (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// An object opened for download
pub struct Download {
    pub object: ObjectSummary,
    pub stream: BlobStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}

/// Orchestrates metadata, permissions and blobs
#[derive(Clone)]
pub struct StorageCoordinator {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    max_upload_bytes: u64,
}

impl StorageCoordinator {
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            metadata,
            blobs,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Sweep over the same stores
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.metadata.clone(), self.blobs.clone())
    }

    /// Every object `identity` may read
    pub async fn list_accessible(&self, identity: &Identity) -> StorageResult<Vec<ObjectSummary>> {
        let objects = self.metadata.list_readable(identity.username()).await?;
        Ok(objects.iter().map(ObjectSummary::from).collect())
    }

    /// Store `data` as `filename`, owned by `identity`
    pub async fn upload(
        &self,
        identity: &Identity,
        filename: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> StorageResult<ObjectSummary> {
        validate_filename(filename)?;
        let size = data.len() as u64;
        if size > self.max_upload_bytes {
            return Err(StorageError::PayloadTooLarge(size, self.max_upload_bytes));
        }
        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let owner = identity.username();
        if self.metadata.exists_for_owner(owner, filename).await? {
            return Err(StorageError::Conflict(filename.to_string()));
        }

        let object = NewObject::new(owner, filename, content_type, &data);
        let blob_key = object.blob_key.clone();

        // Nothing to roll back if this fails
        self.blobs.put(&blob_key, data).await?;

        match self.metadata.insert_with_owner_grant(object).await {
            Ok(stored) => {
                info!(filename, owner, size, blob_key = %blob_key, "object uploaded");
                Ok(ObjectSummary::from(&stored))
            }
            Err(e) => {
                warn!(filename, owner, error = %e, "metadata write failed, removing blob");
                self.discard_blob(&blob_key).await;
                Err(e)
            }
        }
    }

    /// Open `filename` for streaming if `identity` may read it
    pub async fn download(&self, identity: &Identity, filename: &str) -> StorageResult<Download> {
        let object = self
            .metadata
            .find_with_capability(identity.username(), filename, Capability::Read)
            .await?
            .ok_or(StorageError::PermissionDenied)?;

        let stream = match self.blobs.get(&object.blob_key).await {
            Ok(stream) => stream,
            Err(StorageError::NotFound(_)) => {
                warn!(
                    id = object.id,
                    filename,
                    blob_key = %object.blob_key,
                    "metadata row has no blob"
                );
                return Err(StorageError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e),
        };

        Ok(Download {
            object: ObjectSummary::from(&object),
            stream,
        })
    }

    /// Remove `filename` if `identity` may delete it
    pub async fn delete(&self, identity: &Identity, filename: &str) -> StorageResult<()> {
        let object = self
            .metadata
            .find_with_capability(identity.username(), filename, Capability::Delete)
            .await?
            .ok_or(StorageError::PermissionDenied)?;

        match self.blobs.delete(&object.blob_key).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                warn!(id = object.id, filename, blob_key = %object.blob_key, "blob already missing on delete");
                return Err(StorageError::NotFoundInStorage(filename.to_string()));
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = self.metadata.delete_with_grants(object.id).await {
            error!(
                id = object.id,
                filename,
                error = %e,
                "blob deleted but metadata remains"
            );
            return Err(e);
        }

        info!(id = object.id, filename, user = %identity, "object deleted");
        Ok(())
    }

    async fn discard_blob(&self, blob_key: &str) {
        if let Err(e) = self.blobs.delete(blob_key).await {
            error!(blob_key, error = %e, "compensating delete failed, blob orphaned until reconcile");
        }
    }
}
