//! # File Storage Errors

use thiserror::Error;

use crate::auth::AuthError;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    // Authentication
    #[error("{0}")]
    Unauthenticated(String),

    /// Missing grant and missing object are reported identically
    #[error("Permission denied or file not found")]
    PermissionDenied,

    // Consistency
    /// Permission holds but the blob is gone
    #[error("File not found")]
    NotFound(String),

    /// Blob deletion found nothing to delete
    #[error("File not found in storage")]
    NotFoundInStorage(String),

    #[error("File already exists: {0}")]
    Conflict(String),

    // Validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes (max: {1})")]
    PayloadTooLarge(u64, u64),

    // Backends
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::Unauthenticated(_) => 401,
            StorageError::PermissionDenied => 403,
            StorageError::NotFound(_) => 404,
            StorageError::NotFoundInStorage(_) => 404,
            StorageError::Conflict(_) => 409,
            StorageError::InvalidInput(_) => 400,
            StorageError::PayloadTooLarge(_, _) => 413,
            StorageError::BackendUnavailable(_) => 503,
            StorageError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Unauthenticated(_) => "unauthenticated",
            StorageError::PermissionDenied => "permission_denied",
            StorageError::NotFound(_) => "not_found",
            StorageError::NotFoundInStorage(_) => "not_found_in_storage",
            StorageError::Conflict(_) => "conflict",
            StorageError::InvalidInput(_) => "invalid_input",
            StorageError::PayloadTooLarge(_, _) => "payload_too_large",
            StorageError::BackendUnavailable(_) => "backend_unavailable",
            StorageError::Internal(_) => "internal",
        }
    }
}

impl From<AuthError> for StorageError {
    fn from(e: AuthError) -> Self {
        StorageError::Unauthenticated(e.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Conflict(db.message().to_string())
            }
            sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnDecode { .. } => {
                StorageError::Internal(e.to_string())
            }
            _ => StorageError::BackendUnavailable(e.to_string()),
        }
    }
}

impl From<object_store::Error> for StorageError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::BackendUnavailable(other.to_string()),
        }
    }
}
