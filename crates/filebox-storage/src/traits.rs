//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::keys::ObjectKey;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
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

    #[error("Listing failed: {0}")]
    ListFailed(String),

    #[error("Container initialization failed: {0}")]
    InitializeFailed(String),

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

/// Object content as handed back by [`Storage::load`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// Implementations hold no per-request state, so one instance is shared by
/// every handler behind an `Arc<dyn Storage>`. No operation retries or
/// imposes a timeout; callers bound and cancel them.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Ensure the backing container exists.
    ///
    /// Idempotent: an existing container is success, not an error. Safe to
    /// run while saves and loads are in flight.
    async fn initialize(&self) -> StorageResult<()>;

    /// Snapshot of every key currently in the container, in backend order.
    ///
    /// An empty container yields an empty list.
    async fn list_names(&self) -> StorageResult<Vec<ObjectKey>>;

    /// Write `reader` to `key` until EOF, replacing any existing object.
    ///
    /// Content is streamed to the backend; the full object is never held in
    /// memory. Concurrent saves to the same key race and the last to finish
    /// wins, but a reader always sees one complete object.
    async fn save(
        &self,
        key: &ObjectKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<()>;

    /// Open the object stored at `key`.
    ///
    /// Existence is checked before the stream is built, so a missing object
    /// fails with `NotFound` here and never mid-stream.
    async fn load(&self, key: &ObjectKey) -> StorageResult<ByteStream>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
