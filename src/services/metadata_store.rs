//! src/services/metadata_store.rs
//!
//! MetadataStore: the `files` table in SQLite. One row per stored blob; the
//! store assigns identifiers and timestamps and enforces stored-name
//! uniqueness. There is deliberately no update path.

use crate::models::file_record::{FileRecord, NewFileRecord};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

const FILE_COLUMNS: &str = "id, filename, original_name, file_path, file_size, mime_type, \
                            upload_date, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file `{0}` not found")]
    NotFound(i64),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Metadata operations over an injected SQLite pool.
#[derive(Clone)]
pub struct MetadataStore {
    pub db: Arc<SqlitePool>,
}

impl MetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            tracing::debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Insert a new row and return it as stored, including the assigned id
    /// and defaulted timestamps.
    pub async fn insert(&self, record: &NewFileRecord) -> StoreResult<FileRecord> {
        let sql = format!(
            "INSERT INTO files (filename, original_name, file_path, file_size, mime_type)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {FILE_COLUMNS}"
        );
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(&record.stored_name)
            .bind(&record.original_name)
            .bind(&record.storage_path)
            .bind(record.size_bytes)
            .bind(&record.mime_type)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| {
                if is_constraint_violation(&err) {
                    StoreError::Constraint(err.to_string())
                } else {
                    StoreError::Sqlx(err)
                }
            })
    }

    pub async fn get_by_id(&self, id: i64) -> StoreResult<FileRecord> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => StoreError::NotFound(id),
                other => StoreError::Sqlx(other),
            })
    }

    /// All rows, newest upload first. Rows sharing a timestamp fall back to
    /// id order so insertion order is still respected.
    pub async fn list_all(&self) -> StoreResult<Vec<FileRecord>> {
        let sql =
            format!("SELECT {FILE_COLUMNS} FROM files ORDER BY upload_date DESC, id DESC");
        let rows = sqlx::query_as::<_, FileRecord>(&sql)
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Delete a row, returning how many rows were removed (0 or 1).
    pub async fn delete_by_id(&self, id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }

    // --- probes used by the health reporter ---

    pub async fn ping(&self) -> StoreResult<()> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if value != 1 {
            return Err(StoreError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected probe result: {}",
                value
            ))));
        }
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> StoreResult<bool> {
        let found = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(found.is_some())
    }

    pub async fn table_names(&self) -> StoreResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(names)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    pub async fn sqlite_version(&self) -> StoreResult<String> {
        let version = sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
            .fetch_one(&*self.db)
            .await?;
        Ok(version)
    }
}

/// Return true if the SQLx error is a UNIQUE/CHECK/NOT NULL style violation.
fn is_constraint_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err.is_check_violation()
                || db_err.message().to_ascii_lowercase().contains("constraint")
        }
        _ => false,
    }
}
