//! Annotation stage: fetch labels, safe-search and web detection for a
//! source image concurrently and persist each kind as its own record.

use pictura_core::{AnnotationKind, ObjectRef, PipelineError};
use pictura_db::DocumentStore;
use pictura_vision::AnnotationService;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::timeout::bounded;

/// Raw payloads returned by the annotation service, one per kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSet {
    pub labels: Value,
    pub safe_search: Value,
    pub web_detection: Value,
}

pub struct AnnotationOrchestrator {
    annotator: Arc<dyn AnnotationService>,
    documents: Arc<dyn DocumentStore>,
    call_timeout: Duration,
}

impl AnnotationOrchestrator {
    pub fn new(
        annotator: Arc<dyn AnnotationService>,
        documents: Arc<dyn DocumentStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            annotator,
            documents,
            call_timeout,
        }
    }

    /// Run the three detections concurrently. Every kind that succeeds is
    /// persisted even when a sibling fails; the first failure in
    /// labels, safe-search, web order is returned.
    #[tracing::instrument(skip(self, image_id, source), fields(image_id = %image_id, source = %source))]
    pub async fn annotate(
        &self,
        image_id: &str,
        source: &ObjectRef,
    ) -> Result<AnnotationSet, PipelineError> {
        let (labels, safe_search, web_detection) = tokio::join!(
            self.fetch_and_store(AnnotationKind::Labels, image_id, source),
            self.fetch_and_store(AnnotationKind::SafeSearch, image_id, source),
            self.fetch_and_store(AnnotationKind::WebDetection, image_id, source),
        );

        Ok(AnnotationSet {
            labels: labels?,
            safe_search: safe_search?,
            web_detection: web_detection?,
        })
    }

    async fn fetch_and_store(
        &self,
        kind: AnnotationKind,
        image_id: &str,
        source: &ObjectRef,
    ) -> Result<Value, PipelineError> {
        let start = std::time::Instant::now();
        let operation = format!("{} annotation", kind);

        let payload = bounded(&operation, self.call_timeout, self.annotator.detect(kind, source))
            .await?
            .map_err(|e| PipelineError::Annotation {
                kind,
                message: e.to_string(),
            })?;

        let record = json!({ kind.field(): payload.clone() });
        bounded(
            &operation,
            self.call_timeout,
            self.documents.replace(kind.collection(), image_id, record),
        )
        .await?
        .map_err(|e| PipelineError::Annotation {
            kind,
            message: format!("Failed to persist annotation: {}", e),
        })?;

        tracing::info!(
            image_id = %image_id,
            kind = %kind,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Annotation stored"
        );

        Ok(payload)
    }
}
