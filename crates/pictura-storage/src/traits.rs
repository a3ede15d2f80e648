//! Object store abstraction trait
//!
//! This module defines the ObjectStore trait that all storage backends must implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::{ObjectRef, StorageBackend};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object path: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An object written by [`ObjectStore::upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub object: ObjectRef,
    pub content_type: String,
    pub download_token: String,
    pub size_bytes: u64,
}

/// Metadata the local store keeps in a sidecar file next to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub size_bytes: u64,
    pub download_token: Option<String>,
}

/// Object store abstraction trait
///
/// All storage backends (Cloud Storage, local filesystem) implement this trait,
/// so pipeline components receive an `Arc<dyn ObjectStore>` and never depend on
/// a concrete backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy an object into a local file. Returns the number of bytes written.
    async fn download(&self, object: &ObjectRef, destination: &Path) -> StorageResult<u64>;

    /// Upload a local file, attaching `download_token` as retrievable metadata.
    async fn upload(
        &self,
        source: &Path,
        destination: &ObjectRef,
        content_type: &str,
        download_token: &str,
    ) -> StorageResult<StoredObject>;

    /// Delete an object. Fails with `NotFound` if it does not exist.
    async fn delete(&self, object: &ObjectRef) -> StorageResult<()>;

    /// Delete an object if present. Returns whether something was removed;
    /// absence is not an error.
    async fn delete_if_exists(&self, object: &ObjectRef) -> StorageResult<bool> {
        match self.delete(object).await {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
