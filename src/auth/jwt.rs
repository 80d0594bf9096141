//! # JWT Token Management
//!
//! HS256 bearer tokens asserting a username.
//!
//! Tokens carry a `username` claim and an `iat` timestamp. An `exp` claim is
//! only added when a lifetime is configured; when present it is enforced,
//! when absent the token is valid until the shared secret rotates.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};

/// Verified username carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    pub fn username(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub username: String,

    /// Issued at (Unix epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration (Unix epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret, distributed to both services
    pub secret: String,

    /// Token lifetime; `None` issues tokens without `exp`
    pub token_ttl: Option<Duration>,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: None,
        }
    }
}

/// Issues and verifies bearer tokens with one shared secret
#[derive(Clone)]
pub struct JwtManager {
    token_ttl: Option<Duration>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            token_ttl: config.token_ttl,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Issue a token for `username`
    pub fn issue_token(&self, username: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            username: username.to_string(),
            iat: Some(now.timestamp()),
            exp: self.token_ttl.map(|ttl| (now + ttl).timestamp()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Verify a token and extract the identity it asserts.
    ///
    /// Pure: no store is consulted.
    pub fn verify(&self, token: &str) -> AuthResult<Identity> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        if data.claims.username.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(Identity::new(data.claims.username))
    }
}

/// Token response returned by `/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}
