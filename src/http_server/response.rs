//! Shared error body for both services

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::file_storage::StorageError;

/// Handler error: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub detail: String,
    /// Stable machine-readable code
    pub error: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

impl From<StorageError> for ErrorResponse {
    fn from(e: StorageError) -> Self {
        Self::new(e.to_string(), e.code())
    }
}

impl From<AuthError> for ErrorResponse {
    fn from(e: AuthError) -> Self {
        Self::new(e.to_string(), e.code())
    }
}

pub fn storage_error(e: StorageError) -> ApiError {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(e)))
}

pub fn auth_error(e: AuthError) -> ApiError {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(e)))
}

/// Malformed body, query or multipart framing; always 400 `invalid_input`
pub fn invalid_request(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(detail, "invalid_input")),
    )
}
