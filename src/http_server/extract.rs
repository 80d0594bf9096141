//! Bearer token extraction
//!
//! Every storage endpoint takes `Authorization: Bearer <token>`. Downloads
//! also accept a `?token=` query parameter so plain links work; the header
//! wins whenever it carries a bearer credential.

use axum::http::{header, HeaderMap};

use crate::auth::{AuthError, AuthResult, Identity, JwtManager};

/// Token from an `Authorization: Bearer` header (scheme is case-insensitive)
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Identity from the bearer header
pub fn authenticate(jwt: &JwtManager, headers: &HeaderMap) -> AuthResult<Identity> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    jwt.verify(token)
}

/// Identity from the bearer header, falling back to a query token.
///
/// An invalid header token fails even when the query token is valid.
pub fn authenticate_with_query(
    jwt: &JwtManager,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> AuthResult<Identity> {
    if let Some(token) = bearer_token(headers) {
        return jwt.verify(token);
    }
    match query_token.filter(|t| !t.is_empty()) {
        Some(token) => jwt.verify(token),
        None => Err(AuthError::MissingToken),
    }
}
