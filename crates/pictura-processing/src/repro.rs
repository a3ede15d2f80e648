//! Reproduction stage: one derivative per registry entry, each transformed,
//! uploaded with a fresh download token and registered on the image record.

use chrono::Utc;
use futures::future::join_all;
use pictura_core::constants::collections;
use pictura_core::{DerivativeSpec, ObjectRef, PipelineError};
use pictura_db::DocumentStore;
use pictura_storage::{download_url, ObjectStore};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::scratch::{remove_if_exists, ScratchDir};
use crate::timeout::bounded;
use crate::tools::ImageTool;

/// Result of generating one derivative: its public URL, or a failure scoped
/// to that derivative.
#[derive(Debug)]
pub struct ReproductionOutcome {
    pub name: String,
    pub result: Result<String, PipelineError>,
}

impl ReproductionOutcome {
    pub fn url(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct ReproductionGenerator {
    storage: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    tool: Arc<dyn ImageTool>,
    derivatives: Vec<DerivativeSpec>,
    download_url_host: String,
    call_timeout: Duration,
}

/// Source of every derivative in one invocation.
pub struct ReproductionSource<'a> {
    pub image_id: &'a str,
    pub object: &'a ObjectRef,
    pub content_type: &'a str,
    pub local_path: &'a Path,
}

impl ReproductionGenerator {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        documents: Arc<dyn DocumentStore>,
        tool: Arc<dyn ImageTool>,
        derivatives: Vec<DerivativeSpec>,
        download_url_host: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            documents,
            tool,
            derivatives,
            download_url_host: download_url_host.into(),
            call_timeout,
        }
    }

    /// Generate every derivative concurrently. One outcome per derivative, in
    /// registry order; a failing derivative never affects its siblings.
    #[tracing::instrument(skip(self, source, scratch), fields(image_id = %source.image_id))]
    pub async fn generate(
        &self,
        source: &ReproductionSource<'_>,
        scratch: &ScratchDir,
    ) -> Vec<ReproductionOutcome> {
        join_all(self.derivatives.iter().map(|spec| async move {
            let result = self.generate_one(spec, source, scratch).await;
            match &result {
                Ok(url) => tracing::info!(
                    image_id = %source.image_id,
                    repro = spec.name,
                    url = %url,
                    "Reproduction registered"
                ),
                Err(e) => tracing::warn!(
                    image_id = %source.image_id,
                    repro = spec.name,
                    error = %e,
                    "Reproduction failed"
                ),
            }
            ReproductionOutcome {
                name: spec.name.to_string(),
                result,
            }
        }))
        .await
    }

    async fn generate_one(
        &self,
        spec: &DerivativeSpec,
        source: &ReproductionSource<'_>,
        scratch: &ScratchDir,
    ) -> Result<String, PipelineError> {
        let file_name = spec.file_name(source.object.file_name());
        let local = scratch.file(&file_name);

        let result = self.render_and_publish(spec, source, &local).await;

        if let Err(e) = remove_if_exists(&local).await {
            tracing::warn!(
                path = %local.display(),
                error = %e,
                "Failed to remove local reproduction"
            );
        }

        result.map_err(|e| match e {
            PipelineError::Reproduction { .. } => e,
            other => PipelineError::Reproduction {
                name: spec.name.to_string(),
                message: other.to_string(),
            },
        })
    }

    async fn render_and_publish(
        &self,
        spec: &DerivativeSpec,
        source: &ReproductionSource<'_>,
        local: &Path,
    ) -> Result<String, PipelineError> {
        let failed = |message: String| PipelineError::Reproduction {
            name: spec.name.to_string(),
            message,
        };

        bounded(
            "convert",
            self.call_timeout,
            self.tool.transform(source.local_path, local, spec),
        )
        .await?
        .map_err(|e| failed(e.to_string()))?;

        let token = Uuid::new_v4().to_string();
        let destination = ObjectRef::new(
            source.object.bucket.clone(),
            spec.object_path(source.image_id, source.object.file_name()),
        );

        let stored = bounded(
            "reproduction upload",
            self.call_timeout,
            self.storage
                .upload(local, &destination, source.content_type, &token),
        )
        .await?
        .map_err(|e| failed(format!("Upload failed: {}", e)))?;

        let url = download_url(&self.download_url_host, &stored);

        let patch = json!({
            "repros": { spec.name: url.clone() },
            "updated": Utc::now().to_rfc3339(),
        });
        bounded(
            "image record merge",
            self.call_timeout,
            self.documents
                .merge_into(collections::IMAGES, source.image_id, patch),
        )
        .await?
        .map_err(|e| failed(format!("Failed to register URL: {}", e)))?;

        Ok(url)
    }
}
