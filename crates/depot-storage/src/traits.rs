//! Storage abstraction trait
//!
//! This module defines the [`FileStorage`] trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{AppError, ByteRange, FileMetadata};
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid file size: {0}")]
    InvalidSize(i64),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Content handed to [`FileStorage::store`]; consumed until EOF.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Content returned by [`FileStorage::fetch`].
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Result of a fetch.
pub struct FetchedFile {
    /// Stored metadata. `size` is the total object size, not the window size.
    pub metadata: FileMetadata,
    /// Inclusive `(start, end)` actually served when a range was requested.
    pub range: Option<(u64, u64)>,
    pub content: ContentStream,
}

impl FetchedFile {
    /// Number of bytes `content` will yield.
    pub fn content_length(&self) -> u64 {
        match self.range {
            Some((start, end)) => end - start + 1,
            None => self.metadata.size.max(0) as u64,
        }
    }
}

impl std::fmt::Debug for FetchedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedFile")
            .field("metadata", &self.metadata)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

/// Storage abstraction trait
///
/// Both backends must behave identically for every operation: an absent object
/// is always reported as [`StorageError::NotFound`], never as a generic failure.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write `reader` under `(metadata.category, metadata.filename)`, creating the
    /// category container if needed. Returns the number of bytes written.
    ///
    /// `metadata.size` may be `UNKNOWN_SIZE`; a known size must be positive.
    async fn store(&self, metadata: &FileMetadata, reader: ContentReader) -> StorageResult<u64>;

    /// Read an object, or only the requested window of it.
    async fn fetch(
        &self,
        filename: &str,
        category: &str,
        range: Option<ByteRange>,
    ) -> StorageResult<FetchedFile>;

    /// Check if an object exists
    async fn exists(&self, filename: &str, category: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting an absent object is `NotFound`.
    async fn delete(&self, filename: &str, category: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Normalizes every backend failure into the shared error taxonomy.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidRange(msg) => AppError::invalid_argument(
                depot_core::InvalidArgumentCode::InvalidRange,
                format!("invalid range: {}", msg),
            ),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::InvalidSize(size) => {
                AppError::InvalidInput(format!("invalid file size: {}", size))
            }
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::BackendError(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        }
    }
}
