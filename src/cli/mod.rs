//! CLI module for FileVault
//!
//! Provides command-line interface for:
//! - storage: Run the storage service
//! - identity: Run the identity service
//! - reconcile: One consistency sweep over the storage service's stores

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{identity, reconcile, run, run_command, storage, DEFAULT_LOG_FILTER};
pub use config::{IdentityConfig, StorageConfig, SECRET_ENV};
pub use errors::{CliError, CliErrorCode, CliResult};
