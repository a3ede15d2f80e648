use crate::keys::{validate_bucket, validate_path};
use crate::traits::{ObjectMetadata, ObjectStore, StorageError, StorageResult, StoredObject};
use crate::{ObjectRef, StorageBackend};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

const METADATA_DIR: &str = ".metadata";

/// Local filesystem object store
///
/// Objects live at `{base_path}/{bucket}/{path}`; their metadata (content type
/// and download token) is kept as JSON under `{base_path}/.metadata/{bucket}/{path}.json`.
#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    /// Create a new LocalObjectStore rooted at `base_path`, creating it if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalObjectStore { base_path })
    }

    /// Convert an object reference to a filesystem path with traversal checks
    fn object_path(&self, object: &ObjectRef) -> StorageResult<PathBuf> {
        validate_bucket(&object.bucket)?;
        validate_path(&object.path)?;
        Ok(self.base_path.join(&object.bucket).join(&object.path))
    }

    fn metadata_path(&self, object: &ObjectRef) -> StorageResult<PathBuf> {
        validate_bucket(&object.bucket)?;
        validate_path(&object.path)?;
        Ok(self
            .base_path
            .join(METADATA_DIR)
            .join(&object.bucket)
            .join(format!("{}.json", object.path)))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn download(&self, object: &ObjectRef, destination: &Path) -> StorageResult<u64> {
        let path = self.object_path(object)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(object.to_string()));
        }

        let size = fs::copy(&path, destination).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to copy {} to {}: {}",
                path.display(),
                destination.display(),
                e
            ))
        })?;

        tracing::info!(
            object = %object,
            destination = %destination.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(size)
    }

    async fn upload(
        &self,
        source: &Path,
        destination: &ObjectRef,
        content_type: &str,
        download_token: &str,
    ) -> StorageResult<StoredObject> {
        let path = self.object_path(destination)?;
        let metadata_path = self.metadata_path(destination)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;
        self.ensure_parent_dir(&metadata_path).await?;

        let size = fs::copy(source, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;

        let metadata = ObjectMetadata {
            content_type: content_type.to_string(),
            size_bytes: size,
            download_token: Some(download_token.to_string()),
        };
        let encoded = serde_json::to_vec(&metadata)
            .map_err(|e| StorageError::BackendError(format!("Failed to encode metadata: {}", e)))?;
        fs::write(&metadata_path, encoded).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write metadata {}: {}",
                metadata_path.display(),
                e
            ))
        })?;

        tracing::info!(
            object = %destination,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StoredObject {
            object: destination.clone(),
            content_type: content_type.to_string(),
            download_token: download_token.to_string(),
            size_bytes: size,
        })
    }

    async fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        let path = self.object_path(object)?;
        let metadata_path = self.metadata_path(object)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(object.to_string()));
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        match fs::remove_file(&metadata_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %metadata_path.display(),
                    error = %e,
                    "Failed to delete object metadata"
                );
            }
        }

        tracing::info!(object = %object, "Local storage delete successful");

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
