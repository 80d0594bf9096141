//! Service configuration files
//!
//! JSON, every field optional. The token secret comes from the file or the
//! `SECRET` environment variable; a service refuses to boot without one.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::file_storage::coordinator::DEFAULT_MAX_UPLOAD_BYTES;
use crate::file_storage::reconcile::DEFAULT_GRACE;
use crate::file_storage::{BlobStoreConfig, ReconcileOptions};
use crate::http_server::config::{IDENTITY_PORT, STORAGE_PORT};
use crate::http_server::HttpServerConfig;

/// Environment variable consulted when the config has no secret
pub const SECRET_ENV: &str = "SECRET";

/// Storage service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_http")]
    pub http: HttpServerConfig,

    /// Token secret shared with the identity service
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_storage_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub blob_store: BlobStoreConfig,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Seconds between background sweeps; 0 disables them
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    #[serde(default = "default_reconcile_grace_secs")]
    pub reconcile_grace_secs: u64,

    #[serde(default)]
    pub prune_dangling: bool,
}

fn default_storage_http() -> HttpServerConfig {
    HttpServerConfig::with_port(STORAGE_PORT)
}

fn default_storage_database_url() -> String {
    "sqlite://filevault.db".to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_reconcile_interval_secs() -> u64 {
    3600
}

fn default_reconcile_grace_secs() -> u64 {
    DEFAULT_GRACE.as_secs()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            http: default_storage_http(),
            secret: None,
            database_url: default_storage_database_url(),
            blob_store: BlobStoreConfig::default(),
            max_upload_bytes: default_max_upload_bytes(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            reconcile_grace_secs: default_reconcile_grace_secs(),
            prune_dangling: false,
        }
    }
}

impl StorageConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let config: Self = load_or_default(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.max_upload_bytes == 0 {
            return Err(CliError::config_error("max_upload_bytes must be > 0"));
        }
        if self.database_url.is_empty() {
            return Err(CliError::config_error("database_url must not be empty"));
        }
        Ok(())
    }

    pub fn secret(&self) -> CliResult<String> {
        resolve_secret(self.secret.as_deref(), std::env::var(SECRET_ENV).ok())
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            grace: Duration::from_secs(self.reconcile_grace_secs),
            prune_dangling: self.prune_dangling,
        }
    }
}

/// Identity service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_http")]
    pub http: HttpServerConfig,

    /// Token secret shared with the storage service
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_identity_database_url")]
    pub database_url: String,

    /// Token lifetime; absent issues tokens without `exp`
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,

    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

fn default_identity_http() -> HttpServerConfig {
    HttpServerConfig::with_port(IDENTITY_PORT)
}

fn default_identity_database_url() -> String {
    "sqlite://users.db".to_string()
}

fn default_min_password_length() -> usize {
    8
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            http: default_identity_http(),
            secret: None,
            database_url: default_identity_database_url(),
            token_ttl_secs: None,
            min_password_length: default_min_password_length(),
        }
    }
}

impl IdentityConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let config: Self = load_or_default(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.token_ttl_secs == Some(0) {
            return Err(CliError::config_error("token_ttl_secs must be > 0"));
        }
        if self.min_password_length == 0 {
            return Err(CliError::config_error("min_password_length must be > 0"));
        }
        if self.database_url.is_empty() {
            return Err(CliError::config_error("database_url must not be empty"));
        }
        Ok(())
    }

    pub fn secret(&self) -> CliResult<String> {
        resolve_secret(self.secret.as_deref(), std::env::var(SECRET_ENV).ok())
    }

    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        self.token_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::Duration::seconds)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> CliResult<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };

    let content = fs::read_to_string(path).map_err(|e| {
        CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))
}

/// Config value first, then the environment
fn resolve_secret(configured: Option<&str>, env: Option<String>) -> CliResult<String> {
    configured
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| env.filter(|s| !s.trim().is_empty()))
        .ok_or_else(|| {
            CliError::config_error(format!(
                "No token secret: set \"secret\" in the config or the {} environment variable",
                SECRET_ENV
            ))
        })
}
