#[cfg(feature = "store-memory")]
use crate::MemoryDocumentStore;
#[cfg(feature = "store-postgres")]
use crate::PgDocumentStore;
#[allow(unused_imports)]
use crate::{DocumentStore, DocumentStoreError, DocumentStoreResult};
use pictura_core::{DocumentBackend, PipelineConfig};
use std::sync::Arc;

/// Create a document store backend based on configuration
pub async fn create_document_store(
    config: &PipelineConfig,
) -> DocumentStoreResult<Arc<dyn DocumentStore>> {
    match config.document_backend {
        #[cfg(feature = "store-postgres")]
        DocumentBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                DocumentStoreError::ConfigError("DATABASE_URL is not set".to_string())
            })?;
            let store = PgDocumentStore::connect(url, config.db_max_connections).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "store-postgres"))]
        DocumentBackend::Postgres => Err(DocumentStoreError::ConfigError(
            "PostgreSQL document store not available (store-postgres feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "store-memory")]
        DocumentBackend::Memory => {
            tracing::warn!("Using in-memory document store; documents are lost on exit");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }

        #[cfg(not(feature = "store-memory"))]
        DocumentBackend::Memory => Err(DocumentStoreError::ConfigError(
            "In-memory document store not available (store-memory feature not enabled)".to_string(),
        )),
    }
}
