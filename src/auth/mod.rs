//! # Auth Module
//!
//! Bearer token verification shared by both services, plus the user store
//! and credential checks of the identity service.

pub mod errors;
pub mod crypto;
pub mod user;
pub mod jwt;
pub mod identity;

pub use errors::{AuthError, AuthResult};
pub use user::{Credentials, SqliteUserRepository, User, UserRepository};
pub use jwt::{Identity, JwtClaims, JwtConfig, JwtManager, TokenResponse};
pub use identity::IdentityService;
