//! Represents a stored file: one metadata row bound to one blob on disk.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::path::PathBuf;

/// A single uploaded file.
///
/// The row is authoritative: the blob at `storage_path` is expected to exist
/// but may have drifted away, which readers must detect rather than assume.
#[derive(Clone, FromRow, Debug, PartialEq)]
pub struct FileRecord {
    /// Store-assigned identifier, never reused.
    pub id: i64,

    /// Generated on-disk name (random token + original extension).
    #[sqlx(rename = "filename")]
    pub stored_name: String,

    /// Name supplied by the uploader. Display only.
    pub original_name: String,

    /// Location of the blob. Owned exclusively by this record.
    #[sqlx(rename = "file_path")]
    pub storage_path: String,

    /// Persisted blob size in bytes.
    #[sqlx(rename = "file_size")]
    pub size_bytes: i64,

    /// Content type declared at upload time.
    pub mime_type: String,

    #[sqlx(rename = "upload_date")]
    pub uploaded_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path)
    }
}

/// Values supplied by the caller when creating a record.
/// Identifier and timestamps are assigned by the store.
#[derive(Clone, Debug)]
pub struct NewFileRecord {
    pub stored_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub mime_type: String,
}

/// JSON shape of a record as returned to clients.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub upload_date: String,
    pub download_url: String,
    pub view_url: String,
}

impl From<&FileRecord> for FileView {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            filename: record.stored_name.clone(),
            original_name: record.original_name.clone(),
            size: record.size_bytes,
            mime_type: record.mime_type.clone(),
            upload_date: record
                .uploaded_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            download_url: format!("/api/files/{}/download", record.id),
            view_url: format!("/api/files/{}/view", record.id),
        }
    }
}

/// Identity of a record that was just deleted.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeletedFile {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
}

impl From<FileRecord> for DeletedFile {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            filename: record.stored_name,
            original_name: record.original_name,
        }
    }
}
