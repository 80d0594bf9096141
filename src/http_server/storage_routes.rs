//! Storage HTTP Routes
//!
//! Endpoints for listing, uploading, downloading and deleting files.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, DefaultBodyLimit, Multipart,
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::extract::{authenticate, authenticate_with_query};
use super::response::{invalid_request, storage_error, ApiError, DetailResponse, ErrorResponse};
use crate::auth::JwtManager;
use crate::file_storage::object::DEFAULT_CONTENT_TYPE;
use crate::file_storage::{ObjectSummary, StorageCoordinator, StorageError};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ==================
// Shared State
// ==================

/// Storage state shared across handlers
pub struct StorageState {
    pub coordinator: StorageCoordinator,
    pub jwt: JwtManager,
}

impl StorageState {
    pub fn new(coordinator: StorageCoordinator, jwt: JwtManager) -> Self {
        Self { coordinator, jwt }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesListResponse {
    pub files: Vec<ObjectSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub token: Option<String>,
}

// ==================
// Storage Routes
// ==================

/// Create storage routes
pub fn storage_routes(state: Arc<StorageState>) -> Router {
    let body_limit = usize::try_from(state.coordinator.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/files", get(list_files_handler))
        .route("/upload", post(upload_file_handler))
        .route("/download/:filename", get(download_file_handler))
        .route("/delete/:filename", delete(delete_file_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ==================
// Handlers
// ==================

async fn list_files_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
) -> Result<Json<FilesListResponse>, ApiError> {
    let identity = authenticate(&state.jwt, &headers).map_err(|e| storage_error(e.into()))?;

    let files = state
        .coordinator
        .list_accessible(&identity)
        .await
        .map_err(storage_error)?;

    Ok(Json(FilesListResponse { files }))
}

async fn upload_file_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let identity = authenticate(&state.jwt, &headers).map_err(|e| storage_error(e.into()))?;
    let mut multipart = multipart.map_err(|rejection| invalid_request(rejection.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            debug!(field = ?field.name(), "skipping multipart field");
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                storage_error(StorageError::InvalidInput("No filename provided".to_string()))
            })?;
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        let object = state
            .coordinator
            .upload(&identity, &filename, content_type.as_deref(), data)
            .await
            .map_err(storage_error)?;

        return Ok(Json(UploadResponse {
            filename: object.filename,
        }));
    }

    Err(storage_error(StorageError::InvalidInput(
        "No file provided".to_string(),
    )))
}

async fn download_file_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            // An unreadable query carries no token, so only the header can authenticate
            authenticate(&state.jwt, &headers).map_err(|e| storage_error(e.into()))?;
            return Err(invalid_request(rejection.body_text()));
        }
    };
    let identity = authenticate_with_query(&state.jwt, &headers, query.token.as_deref())
        .map_err(|e| storage_error(e.into()))?;

    let download = state
        .coordinator
        .download(&identity, &filename)
        .await
        .map_err(storage_error)?;

    let object = download.object;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.size));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&object.filename)) {
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((response_headers, Body::from_stream(download.stream)).into_response())
}

async fn delete_file_handler(
    State(state): State<Arc<StorageState>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Json<DetailResponse>, ApiError> {
    let identity = authenticate(&state.jwt, &headers).map_err(|e| storage_error(e.into()))?;

    state
        .coordinator
        .delete(&identity, &filename)
        .await
        .map_err(storage_error)?;

    Ok(Json(DetailResponse {
        detail: "File deleted".to_string(),
    }))
}

// ==================
// Helper Functions
// ==================

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    let status = e.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "invalid_input"
    };
    (status, Json(ErrorResponse::new(e.body_text(), code)))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len());
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
