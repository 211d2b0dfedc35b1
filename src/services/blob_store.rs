//! src/services/blob_store.rs
//!
//! BlobStore: payload bytes on local disk. Uploads are streamed into a hidden
//! temp file under `base_path`, size-limited while streaming, fsync'ed, then
//! renamed to a generated `<uuid>.<ext>` name. Nothing here touches SQLite.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    collections::BTreeSet,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("File type .{extension} is not allowed. Allowed types: {allowed}")]
    DisallowedExtension { extension: String, allowed: String },
    #[error("File too large. Maximum size is {limit} bytes")]
    TooLarge { limit: u64 },
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("blob `{0}` not found")]
    NotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// What an upload is allowed to be.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    pub allowed_extensions: BTreeSet<String>,
}

impl UploadPolicy {
    pub fn new<I, S>(max_file_size: u64, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Return the lower-cased extension of `original_name` if it is allowed.
    pub fn check_extension(&self, original_name: &str) -> Result<String, PolicyError> {
        let extension = extension_of(original_name).unwrap_or_default();
        if self.allowed_extensions.contains(&extension) {
            Ok(extension)
        } else {
            Err(PolicyError::DisallowedExtension {
                extension,
                allowed: self
                    .allowed_extensions
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

/// Lower-cased text after the last `.` of the final path segment, if any.
fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Removes `path` when dropped unless disarmed.
///
/// Async cleanup is preferred; the synchronous removal in `drop` covers
/// futures that are cancelled mid-upload.
struct RemoveOnDrop {
    path: Option<PathBuf>,
}

impl RemoveOnDrop {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(&mut self) -> Option<PathBuf> {
        self.path.take()
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("removed abandoned blob {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("failed to remove abandoned blob {}: {}", path.display(), err),
            }
        }
    }
}

/// A fully written blob that no metadata row references yet.
///
/// Call [`PendingBlob::commit`] once the row exists. Otherwise the file is
/// removed, explicitly via [`PendingBlob::discard`] or implicitly on drop.
pub struct PendingBlob {
    pub stored_name: String,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
    guard: RemoveOnDrop,
}

impl PendingBlob {
    pub fn commit(mut self) {
        self.guard.disarm();
    }

    pub async fn discard(mut self) {
        if let Some(path) = self.guard.disarm() {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("discarded blob {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("failed to discard blob {}: {}", path.display(), err),
            }
        }
    }
}

/// Reads and writes blobs under a single content directory.
#[derive(Clone, Debug)]
pub struct BlobStore {
    pub base_path: PathBuf,
    pub policy: UploadPolicy,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>, policy: UploadPolicy) -> Self {
        Self {
            base_path: base_path.into(),
            policy,
        }
    }

    /// Stream an upload to disk under a freshly generated name.
    ///
    /// - Rejects disallowed extensions before touching the disk.
    /// - Aborts as soon as the running size passes `max_file_size`.
    /// - Writes to `.tmp-<uuid>`, fsyncs, then renames into place.
    ///
    /// On any failure nothing is left behind in `base_path`.
    pub async fn write<S>(&self, stream: S, original_name: &str) -> BlobResult<PendingBlob>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let extension = self.policy.check_extension(original_name)?;
        fs::create_dir_all(&self.base_path).await?;

        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        let final_path = self.base_path.join(&stored_name);
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));

        let mut tmp_guard = RemoveOnDrop::new(tmp_path.clone());
        let mut file = File::create(&tmp_path).await?;

        let limit = self.policy.max_file_size;
        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = chunk_res.map_err(|err| {
                if err.kind() == ErrorKind::FileTooLarge {
                    BlobError::Policy(PolicyError::TooLarge { limit })
                } else {
                    BlobError::Io(err)
                }
            })?;
            size_bytes += chunk.len() as u64;
            if size_bytes > limit {
                return Err(PolicyError::TooLarge { limit }.into());
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &final_path).await?;
        // The temp path no longer exists; the guard now owns the final blob.
        tmp_guard.disarm();
        debug!(
            "wrote blob {} ({} bytes) for `{}`",
            final_path.display(),
            size_bytes,
            original_name
        );

        Ok(PendingBlob {
            stored_name,
            storage_path: final_path.clone(),
            size_bytes,
            guard: RemoveOnDrop::new(final_path),
        })
    }

    /// Open a blob for streaming out.
    pub async fn open(&self, storage_path: &Path) -> BlobResult<File> {
        File::open(storage_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobError::NotFound(storage_path.to_path_buf())
            } else {
                BlobError::Io(err)
            }
        })
    }

    pub async fn exists(&self, storage_path: &Path) -> bool {
        fs::try_exists(storage_path).await.unwrap_or(false)
    }

    /// Remove a blob. A blob that is already gone is not an error.
    pub async fn remove(&self, storage_path: &Path) -> BlobResult<()> {
        match fs::remove_file(storage_path).await {
            Ok(()) => {
                debug!("removed physical file {}", storage_path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", storage_path.display());
                Ok(())
            }
            Err(err) => Err(BlobError::Io(err)),
        }
    }
}
