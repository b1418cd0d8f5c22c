//! Database helpers: schema, path handling and the SQLite request log.
//!
//! Reads and writes are separate seams. Handlers get a [`RequestReader`]; only
//! the write queue holds a [`RequestWriter`].

use crate::{
    error::{SchemaError, StorageError},
    models::request::captured_request::CapturedRequest,
};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{path::Path, str::FromStr};

/// Read access to captured requests. Safe to call concurrently.
#[async_trait]
pub trait RequestReader: Send + Sync + 'static {
    /// Every record, most recent first.
    async fn query_all(&self) -> Result<Vec<CapturedRequest>, StorageError>;

    /// Records whose url equals `url` exactly, most recent first.
    /// An empty `url` matches everything.
    async fn query_by_url(&self, url: &str) -> Result<Vec<CapturedRequest>, StorageError>;
}

/// Mutating access to captured requests. Must only be driven from one task.
#[async_trait]
pub trait RequestWriter: Send + Sync + 'static {
    /// Append `record` and return the id storage assigned to it.
    async fn insert(&self, record: &CapturedRequest) -> Result<i64, StorageError>;

    /// Remove every record, returning how many rows were deleted.
    async fn delete_all(&self) -> Result<u64, StorageError>;
}

/// Request log backed by a SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `db_url`.
    pub async fn connect(db_url: &str) -> Result<Self, StorageError> {
        ensure_sqlite_path(db_url);
        let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(SqliteStore { pool })
    }

    /// Create the `requests` table and its url index if absent.
    pub async fn ensure_schema(&self) -> Result<(), SchemaError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS requests (
                id INTEGER NOT NULL PRIMARY KEY,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                headers TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await
        .map_err(SchemaError)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS requests_url ON requests (url)")
            .execute(&self.pool)
            .await
            .map_err(SchemaError)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RequestReader for SqliteStore {
    async fn query_all(&self) -> Result<Vec<CapturedRequest>, StorageError> {
        self.query_by_url("").await
    }

    async fn query_by_url(&self, url: &str) -> Result<Vec<CapturedRequest>, StorageError> {
        let rows = sqlx::query_as::<_, CapturedRequest>(
            "SELECT id, timestamp, method, url, headers, body FROM requests WHERE ?1 = '' OR url = ?1 ORDER BY timestamp DESC, id DESC",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl RequestWriter for SqliteStore {
    async fn insert(&self, record: &CapturedRequest) -> Result<i64, StorageError> {
        let res = sqlx::query(
            "INSERT INTO requests (method, url, headers, body, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.method)
        .bind(&record.url)
        .bind(&record.headers)
        .bind(&record.body)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM requests")
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

/// Ensure the parent folder of a file-backed sqlx SQLite URL exists.
pub fn ensure_sqlite_path(db_url: &str) {
    let Some(path_part) = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
    else {
        return;
    };
    let path_only = path_part.split_once('?').map_or(path_part, |(p, _)| p);
    if path_only.is_empty() || path_only == ":memory:" {
        return;
    }
    if let Some(parent) = Path::new(path_only).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
