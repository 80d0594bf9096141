//! # Metadata Storage
//!
//! The `files` and `permissions` tables. Objects and their grants are written
//! and removed together, each in a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::errors::{StorageError, StorageResult};
use super::object::{NewObject, StoredObject};
use super::permissions::{Capability, PermissionGrant};

/// Trait for metadata and permission persistence
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Whether `owner` already has an object called `filename`
    async fn exists_for_owner(&self, owner: &str, filename: &str) -> StorageResult<bool>;

    /// Insert the object row and the owner's full grant atomically.
    ///
    /// A duplicate (owner, filename) fails with `Conflict`.
    async fn insert_with_owner_grant(&self, object: NewObject) -> StorageResult<StoredObject>;

    /// Objects `user` holds a read grant on, ascending id
    async fn list_readable(&self, user: &str) -> StorageResult<Vec<StoredObject>>;

    /// Object named `filename` on which `user` holds `capability`.
    ///
    /// When several match, the caller's own object wins, then the lowest id.
    async fn find_with_capability(
        &self,
        user: &str,
        filename: &str,
        capability: Capability,
    ) -> StorageResult<Option<StoredObject>>;

    /// Remove grants, then the object row, atomically
    async fn delete_with_grants(&self, id: i64) -> StorageResult<()>;

    /// Insert or replace the grant for (file_id, user)
    async fn put_grant(&self, grant: &PermissionGrant) -> StorageResult<()>;

    /// All grants on an object
    async fn grants_for(&self, id: i64) -> StorageResult<Vec<PermissionGrant>>;

    /// Every object row
    async fn list_all(&self) -> StorageResult<Vec<StoredObject>>;
}

const OBJECT_COLUMNS: &str = "f.id, f.filename, f.owner, f.size, f.content_type, f.checksum, \
                              f.blob_key, f.created_at, f.updated_at";

/// SQLite-backed metadata store
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Wrap a pool, creating the schema if needed
    pub async fn new(pool: SqlitePool) -> StorageResult<Self> {
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> StorageResult<()> {
        let mut conn = pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                size INTEGER NOT NULL,
                content_type TEXT NOT NULL,
                checksum TEXT NOT NULL,
                blob_key TEXT NOT NULL UNIQUE,
                UNIQUE (owner, filename)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS permissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id INTEGER NOT NULL,
                user TEXT NOT NULL,
                can_read BOOLEAN NOT NULL DEFAULT 1,
                can_write BOOLEAN NOT NULL DEFAULT 0,
                can_delete BOOLEAN NOT NULL DEFAULT 0,
                FOREIGN KEY (file_id) REFERENCES files(id),
                UNIQUE (file_id, user)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_permissions_user ON permissions(user)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_filename ON files(filename)")
            .execute(&mut *conn)
            .await?;

        debug!("metadata schema ready");
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Internal(format!("bad timestamp {}: {}", value, e)))
}

fn row_to_object(row: &SqliteRow) -> StorageResult<StoredObject> {
    let size: i64 = row.try_get("size")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(StoredObject {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        owner: row.try_get("owner")?,
        size: size as u64,
        content_type: row.try_get("content_type")?,
        checksum: row.try_get("checksum")?,
        blob_key: row.try_get("blob_key")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_grant(row: &SqliteRow) -> StorageResult<PermissionGrant> {
    Ok(PermissionGrant {
        file_id: row.try_get("file_id")?,
        user: row.try_get("user")?,
        can_read: row.try_get("can_read")?,
        can_write: row.try_get("can_write")?,
        can_delete: row.try_get("can_delete")?,
    })
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn exists_for_owner(&self, owner: &str, filename: &str) -> StorageResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner = ? AND filename = ?")
                .bind(owner)
                .bind(filename)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn insert_with_owner_grant(&self, object: NewObject) -> StorageResult<StoredObject> {
        let now = object.created_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO files (filename, owner, created_at, updated_at, size, content_type, checksum, blob_key)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&object.filename)
        .bind(&object.owner)
        .bind(&now)
        .bind(&now)
        .bind(object.size as i64)
        .bind(&object.content_type)
        .bind(&object.checksum)
        .bind(&object.blob_key)
        .execute(&mut *tx)
        .await
        .map_err(|e| match StorageError::from(e) {
            StorageError::Conflict(_) => StorageError::Conflict(object.filename.clone()),
            other => other,
        })?;
        let id = inserted.last_insert_rowid();

        let grant = PermissionGrant::owner(id, &object.owner);
        sqlx::query(
            r#"
            INSERT INTO permissions (file_id, user, can_read, can_write, can_delete)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(grant.file_id)
        .bind(&grant.user)
        .bind(grant.can_read)
        .bind(grant.can_write)
        .bind(grant.can_delete)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id, filename = %object.filename, owner = %object.owner, "object metadata committed");
        Ok(object.into_stored(id))
    }

    async fn list_readable(&self, user: &str) -> StorageResult<Vec<StoredObject>> {
        let sql = format!(
            r#"
            SELECT {OBJECT_COLUMNS}
            FROM files f
            JOIN permissions p ON f.id = p.file_id
            WHERE p.user = ? AND p.can_read = 1
            ORDER BY f.id
            "#
        );

        let rows = sqlx::query(&sql).bind(user).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_object).collect()
    }

    async fn find_with_capability(
        &self,
        user: &str,
        filename: &str,
        capability: Capability,
    ) -> StorageResult<Option<StoredObject>> {
        let sql = format!(
            r#"
            SELECT {OBJECT_COLUMNS}
            FROM files f
            JOIN permissions p ON f.id = p.file_id
            WHERE f.filename = ? AND p.user = ? AND p.{} = 1
            ORDER BY (f.owner = ?) DESC, f.id ASC
            LIMIT 1
            "#,
            capability.column()
        );

        let row = sqlx::query(&sql)
            .bind(filename)
            .bind(user)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_object).transpose()
    }

    async fn delete_with_grants(&self, id: i64) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM permissions WHERE file_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn put_grant(&self, grant: &PermissionGrant) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permissions (file_id, user, can_read, can_write, can_delete)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (file_id, user) DO UPDATE SET
                can_read = excluded.can_read,
                can_write = excluded.can_write,
                can_delete = excluded.can_delete
            "#,
        )
        .bind(grant.file_id)
        .bind(&grant.user)
        .bind(grant.can_read)
        .bind(grant.can_write)
        .bind(grant.can_delete)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn grants_for(&self, id: i64) -> StorageResult<Vec<PermissionGrant>> {
        let rows = sqlx::query(
            "SELECT file_id, user, can_read, can_write, can_delete FROM permissions WHERE file_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_grant).collect()
    }

    async fn list_all(&self) -> StorageResult<Vec<StoredObject>> {
        let sql = format!("SELECT {OBJECT_COLUMNS} FROM files f ORDER BY f.id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_object).collect()
    }
}
