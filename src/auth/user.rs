//! # User Management
//!
//! User model and the SQLite-backed `users` table of the identity service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use super::errors::{AuthError, AuthResult};

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique username (primary key)
    pub username: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Credentials body shared by `/register` and `/login`
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by username
    async fn find(&self, username: &str) -> AuthResult<Option<User>>;

    /// Create a user; `UserAlreadyExists` if the username is taken
    async fn create(&self, user: &User) -> AuthResult<()>;
}

/// `users` table in SQLite
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Wrap a pool, creating the schema if needed
    pub async fn new(pool: SqlitePool) -> AuthResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find(&self, username: &str) -> AuthResult<Option<User>> {
        let row = sqlx::query(
            "SELECT username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> AuthResult<User> {
            let created_at: String = row.try_get("created_at")?;
            Ok(User {
                username: row.try_get("username")?,
                password_hash: row.try_get("password_hash")?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| AuthError::StorageError(e.to_string()))?,
            })
        })
        .transpose()
    }

    async fn create(&self, user: &User) -> AuthResult<()> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AuthError::UserAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}
