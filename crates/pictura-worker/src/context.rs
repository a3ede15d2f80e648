use anyhow::Context;
use pictura_core::{PipelineConfig, DEFAULT_DERIVATIVES};
use pictura_db::{create_document_store, DocumentStore};
use pictura_processing::{ImageMagick, ImagePurger, Pipeline, PipelineSettings};
use pictura_storage::{create_object_store, ObjectStore};
use pictura_vision::GoogleVisionAnnotator;
use std::sync::Arc;

/// Collaborators shared by every invocation in one worker process.
pub struct WorkerContext {
    pub config: PipelineConfig,
    pub storage: Arc<dyn ObjectStore>,
    pub documents: Arc<dyn DocumentStore>,
}

impl WorkerContext {
    pub async fn connect(config: PipelineConfig) -> anyhow::Result<Self> {
        let storage = create_object_store(&config)
            .await
            .context("Failed to initialize object store")?;
        let documents = create_document_store(&config)
            .await
            .context("Failed to initialize document store")?;

        tracing::info!(
            environment = %config.environment,
            production = config.is_production(),
            storage_backend = %storage.backend_type(),
            document_backend = %config.document_backend,
            "Worker context ready"
        );

        Ok(Self {
            config,
            storage,
            documents,
        })
    }

    pub fn pipeline(&self) -> anyhow::Result<Pipeline> {
        let annotator = GoogleVisionAnnotator::from_config(&self.config)
            .context("Failed to initialize annotation service")?;

        Ok(Pipeline::new(
            self.storage.clone(),
            self.documents.clone(),
            Arc::new(annotator),
            Arc::new(ImageMagick::from_config(&self.config)),
            PipelineSettings::from_config(&self.config),
        ))
    }

    pub fn purger(&self) -> ImagePurger {
        ImagePurger::new(
            self.storage.clone(),
            self.documents.clone(),
            DEFAULT_DERIVATIVES.to_vec(),
        )
    }
}
