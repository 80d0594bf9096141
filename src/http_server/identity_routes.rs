//! Identity HTTP Routes
//!
//! Registration, login and token introspection.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::extract::bearer_token;
use super::response::{auth_error, invalid_request, ApiError};
use crate::auth::{AuthError, Credentials, IdentityService, TokenResponse};

/// Identity state shared across handlers
pub struct IdentityState {
    pub service: IdentityService,
}

impl IdentityState {
    pub fn new(service: IdentityService) -> Self {
        Self { service }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
}

/// Create identity routes
pub fn identity_routes(state: Arc<IdentityState>) -> Router {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/users/me", get(me_handler))
        .with_state(state)
}

async fn register_handler(
    State(state): State<Arc<IdentityState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = credentials(body)?;
    state.service.register(request).await.map_err(auth_error)?;

    Ok(Json(MessageResponse {
        message: "Registration successful".to_string(),
    }))
}

async fn login_handler(
    State(state): State<Arc<IdentityState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let request = credentials(body)?;
    let tokens = state.service.login(request).await.map_err(auth_error)?;
    Ok(Json(tokens))
}

async fn me_handler(
    State(state): State<Arc<IdentityState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(|| auth_error(AuthError::MissingToken))?;
    let identity = state.service.me(token).map_err(auth_error)?;

    Ok(Json(MeResponse {
        username: identity.username().to_string(),
    }))
}

/// Unwrap a credentials body, reporting any JSON rejection as 400
fn credentials(body: Result<Json<Credentials>, JsonRejection>) -> Result<Credentials, ApiError> {
    body.map(|Json(request)| request)
        .map_err(|rejection| invalid_request(rejection.body_text()))
}
