//! # Stored Objects
//!
//! Metadata rows for uploaded objects and the summaries returned to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::{StorageError, StorageResult};

const MAX_FILENAME_LEN: usize = 255;

/// Fallback MIME type when the client sends none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A stored object (one `files` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: i64,
    pub filename: String,
    pub owner: String,
    pub size: u64,
    pub content_type: String,
    pub checksum: String,
    pub blob_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Object not yet persisted; `id` is assigned by the metadata store.
#[derive(Debug, Clone)]
pub struct NewObject {
    pub filename: String,
    pub owner: String,
    pub size: u64,
    pub content_type: String,
    pub checksum: String,
    pub blob_key: String,
    pub created_at: DateTime<Utc>,
}

impl NewObject {
    /// Describe freshly uploaded bytes under a newly generated blob key
    pub fn new(owner: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            owner: owner.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            checksum: calculate_checksum(data),
            blob_key: generate_blob_key(),
            created_at: Utc::now(),
        }
    }

    /// Attach the id assigned on insert
    pub fn into_stored(self, id: i64) -> StoredObject {
        StoredObject {
            id,
            filename: self.filename,
            owner: self.owner,
            size: self.size,
            content_type: self.content_type,
            checksum: self.checksum,
            blob_key: self.blob_key,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Client-facing view of a stored object. The blob key stays internal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub id: i64,
    pub filename: String,
    pub owner: String,
    pub size: u64,
    pub content_type: String,
    pub sha256: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&StoredObject> for ObjectSummary {
    fn from(obj: &StoredObject) -> Self {
        Self {
            id: obj.id,
            filename: obj.filename.clone(),
            owner: obj.owner.clone(),
            size: obj.size,
            content_type: obj.content_type.clone(),
            sha256: obj.checksum.clone(),
            created_at: obj.created_at.to_rfc3339(),
            updated_at: obj.updated_at.to_rfc3339(),
        }
    }
}

/// Blob keys are generated, never derived from the filename
pub fn generate_blob_key() -> String {
    Uuid::new_v4().to_string()
}

/// Calculate checksum for data
pub fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Filenames travel as single URL path segments and header values.
pub fn validate_filename(filename: &str) -> StorageResult<()> {
    if filename.is_empty() {
        return Err(StorageError::InvalidInput("filename must not be empty".into()));
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(StorageError::InvalidInput(format!(
            "filename exceeds {} bytes",
            MAX_FILENAME_LEN
        )));
    }
    if filename == "." || filename == ".." {
        return Err(StorageError::InvalidInput(format!(
            "invalid filename: {}",
            filename
        )));
    }
    if filename
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(StorageError::InvalidInput(
            "filename must not contain path separators or control characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_object_records_size_and_checksum() {
        let obj = NewObject::new("alice", "report.pdf", "application/pdf", b"0123456789");
        assert_eq!(obj.size, 10);
        assert_eq!(obj.checksum.len(), 64);
        assert_ne!(obj.blob_key, "report.pdf");

        let stored = obj.into_stored(7);
        assert_eq!(stored.id, 7);
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[test]
    fn test_blob_keys_are_unique() {
        assert_ne!(generate_blob_key(), generate_blob_key());
    }

    #[test]
    fn test_summary_hides_blob_key() {
        let stored = NewObject::new("alice", "a.txt", "text/plain", b"hi").into_stored(1);
        let json = serde_json::to_value(ObjectSummary::from(&stored)).unwrap();
        assert!(json.get("blob_key").is_none());
        assert_eq!(json["filename"], "a.txt");
        assert_eq!(json["owner"], "alice");
        assert_eq!(json["size"], 2);
    }

    #[test]
    fn test_filename_validation() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("my report (1).pdf").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("a/b.txt").is_err());
        assert!(validate_filename("a\\b.txt").is_err());
        assert!(validate_filename("a\nb").is_err());
        assert!(validate_filename(&"x".repeat(256)).is_err());
    }
}
