//! # Auth Errors
//!
//! Error types for token verification and the identity service.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // ==================
    // Token Errors
    // ==================

    /// No credential was presented
    #[error("Not authenticated")]
    MissingToken,

    /// Token failed signature, structure or claim checks
    #[error("Invalid token")]
    InvalidToken,

    /// Token carried an `exp` claim in the past
    #[error("Token expired")]
    TokenExpired,

    // ==================
    // Identity Errors
    // ==================

    /// Unknown user or wrong password (indistinguishable on purpose)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Username already registered
    #[error("User already exists")]
    UserAlreadyExists,

    /// Registration input rejected
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    // ==================
    // Internal Errors
    // ==================

    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,

    /// User store unreachable or failing
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::UserAlreadyExists => 400,
            AuthError::InvalidRegistration(_) => 400,

            AuthError::MissingToken => 401,
            AuthError::InvalidToken => 401,
            AuthError::TokenExpired => 401,
            AuthError::InvalidCredentials => 401,

            AuthError::HashingFailed => 500,
            AuthError::TokenGenerationFailed => 500,
            AuthError::StorageError(_) => 503,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::TokenExpired => {
                "unauthenticated"
            }
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UserAlreadyExists => "user_exists",
            AuthError::InvalidRegistration(_) => "invalid_input",
            AuthError::HashingFailed | AuthError::TokenGenerationFailed => "internal",
            AuthError::StorageError(_) => "backend_unavailable",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::StorageError(e.to_string())
    }
}
