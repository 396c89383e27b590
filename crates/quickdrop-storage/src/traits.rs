//! Storage abstraction trait
//!
//! This module defines the Storage trait that the file lifecycle backends implement.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use quickdrop_core::{AppError, FileRecord, PickupCode};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The byte stream handed to `persist` failed, as opposed to the backend.
    #[error("Upload stream failed: {0}")]
    SourceFailed(#[source] std::io::Error),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::ReadError(msg),
            StorageError::ReadFailed(msg) => AppError::ReadError(msg),
            StorageError::WriteFailed(msg) => AppError::WriteError(msg),
            StorageError::SourceFailed(err) => {
                AppError::InvalidInput(format!("Upload stream interrupted: {}", err))
            }
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        }
    }
}

/// File lifecycle backend.
///
/// Implementations persist upload streams under a key derived from the pickup code and the
/// display name, serve them back, and delete them when the owning item is reclaimed.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a byte stream as a new file.
    ///
    /// Never overwrites an existing key. On failure no partial file is left behind. A failure
    /// of `reader` itself is reported as `SourceFailed`.
    async fn persist(
        &self,
        code: &PickupCode,
        display_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<FileRecord>;

    /// Persist an in-memory buffer as a new file.
    async fn persist_bytes(
        &self,
        code: &PickupCode,
        display_name: &str,
        data: &[u8],
    ) -> StorageResult<FileRecord> {
        let mut reader = data;
        self.persist(code, display_name, &mut reader).await
    }

    /// Delete the file backing `record`.
    ///
    /// Failures (including an already missing file) are logged and otherwise ignored.
    async fn remove(&self, record: &FileRecord);

    /// Read the whole file into memory.
    async fn read(&self, record: &FileRecord) -> StorageResult<Vec<u8>>;

    /// Open the file as a stream of chunks.
    ///
    /// Fails with `NotFound` when the file is gone, e.g. after a concurrent reclaim.
    async fn open_for_read(&self, record: &FileRecord) -> StorageResult<ByteStream>;

    /// Check if the file backing `record` exists
    async fn exists(&self, record: &FileRecord) -> StorageResult<bool>;

    /// Verify that the backend can accept writes.
    async fn health_check(&self) -> StorageResult<()>;
}
