//! # Identity Service
//!
//! Registration and login. Issues the bearer tokens the storage service
//! verifies with the same shared secret.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::crypto::{hash_password, validate_username, verify_password, PasswordPolicy};
use super::errors::{AuthError, AuthResult};
use super::jwt::{Identity, JwtManager, TokenResponse};
use super::user::{Credentials, User, UserRepository};

/// Identity service combining the user store and token issuance
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    jwt: JwtManager,
    password_policy: PasswordPolicy,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt: JwtManager,
        password_policy: PasswordPolicy,
    ) -> Self {
        Self {
            users,
            jwt,
            password_policy,
        }
    }

    /// Register a new user
    pub async fn register(&self, request: Credentials) -> AuthResult<User> {
        validate_username(&request.username)?;
        self.password_policy.validate(&request.password)?;

        if self.users.find(&request.username).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|_| AuthError::HashingFailed)??;

        let user = User {
            username: request.username,
            password_hash,
            created_at: Utc::now(),
        };
        self.users.create(&user).await?;

        info!(username = %user.username, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a bearer token
    pub async fn login(&self, request: Credentials) -> AuthResult<TokenResponse> {
        let user = self
            .users
            .find(&request.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password = request.password;
        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|_| AuthError::HashingFailed)??;

        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt.issue_token(&user.username)?;
        info!(username = %user.username, "token issued");
        Ok(TokenResponse::bearer(token))
    }

    /// Resolve the identity a token asserts
    pub fn me(&self, token: &str) -> AuthResult<Identity> {
        self.jwt.verify(token)
    }
}
