//! src/services/file_service.rs
//!
//! FileService: ties a `files` row to its blob. Each operation is a short
//! two-phase sequence:
//! - create: write blob, insert row, discard blob if the insert fails
//! - read:   look up row, check blob, open blob
//! - delete: look up row, unlink blob best-effort, delete row
//!
//! Raw store and filesystem errors are classified into `FileError` here and
//! never leak to handlers unclassified.

use crate::{
    models::file_record::{FileRecord, NewFileRecord},
    services::{
        blob_store::{BlobError, BlobStore, PolicyError},
        metadata_store::{MetadataStore, StoreError},
    },
};
use bytes::Bytes;
use futures::Stream;
use std::io;
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("file `{0}` not found")]
    NotFound(i64),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<StoreError> for FileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => FileError::NotFound(id),
            StoreError::Constraint(msg) => FileError::Conflict(msg),
            StoreError::Sqlx(err) => FileError::Database(err),
        }
    }
}

pub type FileResult<T> = Result<T, FileError>;

/// Whether streamed content should be rendered or saved by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Upload details declared by the client.
#[derive(Clone, Debug)]
pub struct Upload {
    pub original_name: String,
    pub mime_type: String,
}

/// Lifecycle coordinator over an injected metadata store and blob store.
#[derive(Clone)]
pub struct FileService {
    pub store: MetadataStore,
    pub blobs: BlobStore,
}

impl FileService {
    pub fn new(store: MetadataStore, blobs: BlobStore) -> Self {
        Self { store, blobs }
    }

    /// Persist an upload and record it.
    ///
    /// No row is created unless the blob was fully written. If the insert
    /// fails the blob is removed before the error is returned.
    pub async fn create<S>(&self, upload: Upload, stream: S) -> FileResult<FileRecord>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let pending = self
            .blobs
            .write(stream, &upload.original_name)
            .await
            .map_err(|err| classify_blob_error(err, None))?;

        let new_record = NewFileRecord {
            stored_name: pending.stored_name.clone(),
            original_name: upload.original_name,
            storage_path: pending.storage_path.to_string_lossy().into_owned(),
            size_bytes: pending.size_bytes as i64,
            mime_type: upload.mime_type,
        };

        match self.store.insert(&new_record).await {
            Ok(record) => {
                pending.commit();
                info!(
                    "stored file {} as {} ({} bytes)",
                    record.id, record.stored_name, record.size_bytes
                );
                Ok(record)
            }
            Err(err) => {
                warn!(
                    "insert failed for {}, discarding blob: {}",
                    new_record.stored_name, err
                );
                pending.discard().await;
                Err(err.into())
            }
        }
    }

    pub async fn get(&self, id: i64) -> FileResult<FileRecord> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn list(&self) -> FileResult<Vec<FileRecord>> {
        Ok(self.store.list_all().await?)
    }

    /// Look up a record and open its blob for streaming.
    ///
    /// A missing blob is reported exactly like a missing row, including a
    /// blob deleted between the presence check and the open.
    pub async fn open_content(&self, id: i64) -> FileResult<(FileRecord, File)> {
        let record = self.store.get_by_id(id).await?;
        let path = record.path();

        if !self.blobs.exists(&path).await {
            warn!(
                "file {} has a record but no blob at {}",
                id,
                path.display()
            );
            return Err(FileError::NotFound(id));
        }

        let file = self
            .blobs
            .open(&path)
            .await
            .map_err(|err| classify_blob_error(err, Some(id)))?;
        Ok((record, file))
    }

    /// Delete a record and, best-effort, its blob.
    ///
    /// The row is authoritative: a blob that cannot be removed is logged and
    /// the row is deleted anyway.
    pub async fn delete(&self, id: i64) -> FileResult<FileRecord> {
        let record = self.store.get_by_id(id).await?;
        let path = record.path();

        if let Err(err) = self.blobs.remove(&path).await {
            warn!(
                "error deleting file {} from filesystem: {}",
                path.display(),
                err
            );
        }

        let affected = self.store.delete_by_id(id).await?;
        if affected == 0 {
            debug!("file {} disappeared before its row could be deleted", id);
            return Err(FileError::NotFound(id));
        }

        info!("deleted file {} ({})", id, record.stored_name);
        Ok(record)
    }
}

fn classify_blob_error(err: BlobError, id: Option<i64>) -> FileError {
    match (err, id) {
        (BlobError::Policy(policy), _) => FileError::Policy(policy),
        (BlobError::NotFound(_), Some(id)) => FileError::NotFound(id),
        (BlobError::NotFound(path), None) => FileError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("blob {} not found", path.display()),
        )),
        (BlobError::Io(err), _) => FileError::Io(err),
    }
}
