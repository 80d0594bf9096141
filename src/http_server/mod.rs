//! # HTTP Server Module
//!
//! Axum routers for the storage and identity services.
//!
//! # Endpoints
//!
//! Storage:
//! - `GET /files` - Objects the caller may read
//! - `POST /upload` - Multipart upload, field `file`
//! - `GET /download/{filename}` - Stream a file (bearer header or `?token=`)
//! - `DELETE /delete/{filename}` - Remove a file
//!
//! Identity:
//! - `POST /register`, `POST /login`, `GET /users/me`
//!
//! Both expose `GET /health`.

pub mod config;
pub mod extract;
pub mod response;
pub mod health_routes;
pub mod storage_routes;
pub mod identity_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use identity_routes::IdentityState;
pub use response::ErrorResponse;
pub use server::HttpServer;
pub use storage_routes::StorageState;
