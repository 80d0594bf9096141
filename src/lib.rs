//! filevault - permission-checked file storage
//!
//! Two services sharing one token secret:
//! - identity: registers users and issues bearer tokens
//! - storage: lists, uploads, downloads and deletes files, checking a
//!   per-file grant for every access

pub mod auth;
pub mod cli;
pub mod db;
pub mod file_storage;
pub mod http_server;
