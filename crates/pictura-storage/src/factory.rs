#[cfg(feature = "storage-gcs")]
use crate::GcsObjectStore;
#[cfg(feature = "storage-local")]
use crate::LocalObjectStore;
#[allow(unused_imports)]
use crate::{ObjectStore, StorageBackend, StorageError, StorageResult};
use pictura_core::PipelineConfig;
use std::sync::Arc;

/// Create an object store backend based on configuration
pub async fn create_object_store(config: &PipelineConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        #[cfg(feature = "storage-gcs")]
        StorageBackend::Gcs => {
            let store = GcsObjectStore::new(
                config.gcs_api_base.clone(),
                config.gcs_access_token.clone(),
                config.external_call_timeout(),
            )?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-gcs"))]
        StorageBackend::Gcs => Err(StorageError::ConfigError(
            "Cloud Storage backend not available (storage-gcs feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let store = LocalObjectStore::new(config.local_storage_path.clone()).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
