//! CLI command implementations
//!
//! Each service boots the same way: load config, resolve the token secret,
//! open its SQLite pool and stores, then serve until ctrl-c.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::args::Command;
use super::config::{IdentityConfig, StorageConfig};
use super::errors::{CliError, CliResult};
use crate::auth::crypto::PasswordPolicy;
use crate::auth::{IdentityService, JwtConfig, JwtManager, SqliteUserRepository};
use crate::db;
use crate::file_storage::{ObjectStoreBackend, SqliteMetadataStore, StorageCoordinator};
use crate::http_server::{HttpServer, IdentityState, StorageState};

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "filevault=info,tower_http=info";

/// Parse arguments, set up logging and run the chosen command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    init_tracing();

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to start runtime: {}", e)))?;
    runtime.block_on(run_command(cli.command))
}

/// Run the appropriate command based on CLI args
pub async fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Storage { config } => storage(config.as_deref()).await,
        Command::Identity { config } => identity(config.as_deref()).await,
        Command::Reconcile {
            config,
            prune_dangling,
        } => reconcile(config.as_deref(), prune_dangling).await,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the metadata and blob stores named by `config`
async fn open_coordinator(config: &StorageConfig) -> CliResult<StorageCoordinator> {
    let pool = db::connect(&config.database_url).await.map_err(|e| {
        CliError::boot_failed(format!("Failed to open {}: {}", config.database_url, e))
    })?;
    let metadata = SqliteMetadataStore::new(pool)
        .await
        .map_err(|e| CliError::boot_failed(format!("Failed to migrate metadata store: {}", e)))?;
    let blobs = ObjectStoreBackend::from_config(&config.blob_store)
        .map_err(|e| CliError::boot_failed(format!("Failed to open blob store: {}", e)))?;

    Ok(StorageCoordinator::new(Arc::new(metadata), Arc::new(blobs))
        .with_max_upload_bytes(config.max_upload_bytes))
}

/// Run the storage service
pub async fn storage(config_path: Option<&Path>) -> CliResult<()> {
    let config = StorageConfig::load(config_path)?;
    let jwt = JwtManager::new(JwtConfig::new(config.secret()?));
    let coordinator = open_coordinator(&config).await?;

    let sweeper = config.reconcile_interval().map(|period| {
        info!(interval_secs = period.as_secs(), "background reconcile enabled");
        coordinator
            .reconciler()
            .spawn_periodic(period, config.reconcile_options())
    });

    let state = Arc::new(StorageState::new(coordinator, jwt));
    let result = HttpServer::storage(config.http.clone(), state).start().await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result.map_err(|e| CliError::serve_failed(e.to_string()))
}

/// Run the identity service
pub async fn identity(config_path: Option<&Path>) -> CliResult<()> {
    let config = IdentityConfig::load(config_path)?;
    let jwt = JwtManager::new(JwtConfig {
        secret: config.secret()?,
        token_ttl: config.token_ttl(),
    });

    let pool = db::connect(&config.database_url).await.map_err(|e| {
        CliError::boot_failed(format!("Failed to open {}: {}", config.database_url, e))
    })?;
    let users = SqliteUserRepository::new(pool)
        .await
        .map_err(|e| CliError::boot_failed(format!("Failed to migrate user store: {}", e)))?;

    let policy = PasswordPolicy {
        min_length: config.min_password_length,
    };
    let service = IdentityService::new(Arc::new(users), jwt, policy);

    HttpServer::identity(config.http.clone(), Arc::new(IdentityState::new(service)))
        .start()
        .await
        .map_err(|e| CliError::serve_failed(e.to_string()))
}

/// One sweep, report written to stdout as JSON
pub async fn reconcile(config_path: Option<&Path>, prune_dangling: bool) -> CliResult<()> {
    let config = StorageConfig::load(config_path)?;
    let coordinator = open_coordinator(&config).await?;

    let mut options = config.reconcile_options();
    options.prune_dangling |= prune_dangling;

    let report = coordinator
        .reconciler()
        .run(&options)
        .await
        .map_err(|e| CliError::reconcile_failed(e.to_string()))?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;

    #[tokio::test]
    async fn test_storage_without_secret_fails_to_boot() {
        if std::env::var(super::super::config::SECRET_ENV).is_ok() {
            return;
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"blob_store": {{"backend": "memory"}}}}"#).unwrap();

        let err = storage(Some(file.path())).await.unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[tokio::test]
    async fn test_identity_without_secret_fails_to_boot() {
        if std::env::var(super::super::config::SECRET_ENV).is_ok() {
            return;
        }
        let err = identity(None).await.unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[tokio::test]
    async fn test_reconcile_on_empty_stores() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("meta.db");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"database_url": "sqlite://{}", "blob_store": {{"backend": "local", "root": "{}"}}}}"#,
            db_path.display(),
            dir.path().join("blobs").display()
        )
        .unwrap();

        reconcile(Some(file.path()), false).await.unwrap();
    }
}
