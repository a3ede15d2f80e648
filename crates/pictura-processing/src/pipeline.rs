//! Pipeline coordinator.
//!
//! Runs one upload event through the stages
//! `Received -> Guarded -> Annotating -> Extracting -> GeneratingRepros -> CleaningUp -> Done`.
//! A guard rejection ends the invocation early with no error. Any other
//! failure stops at the stage it occurred in; records written by earlier
//! stages are kept. Derivative failures are scoped to their derivative and
//! reported in the [`ProcessingReport`].

use pictura_core::{
    DerivativeSpec, LogLevel, ObjectRef, PipelineConfig, PipelineError, PipelineStage,
    RejectReason, StageFailure, UploadEvent, DEFAULT_DERIVATIVES,
};
use pictura_db::DocumentStore;
use pictura_storage::ObjectStore;
use pictura_vision::AnnotationService;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate::{AnnotationOrchestrator, AnnotationSet};
use crate::exif::MetadataExtractor;
use crate::guard::{evaluate, GuardDecision};
use crate::repro::{ReproductionGenerator, ReproductionOutcome, ReproductionSource};
use crate::scratch::ScratchDir;
use crate::tools::ImageTool;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub derivatives: Vec<DerivativeSpec>,
    pub scratch_root: PathBuf,
    pub call_timeout: Duration,
    pub enforce_first_generation: bool,
    pub download_url_host: String,
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            derivatives: DEFAULT_DERIVATIVES.to_vec(),
            scratch_root: config.scratch_dir.clone(),
            call_timeout: config.external_call_timeout(),
            enforce_first_generation: config.enforce_first_generation,
            download_url_host: config.download_url_host.clone(),
        }
    }
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// The guard declined the event.
    Rejected(RejectReason),
    Done(ProcessingReport),
}

/// Everything an accepted invocation produced.
#[derive(Debug)]
pub struct ProcessingReport {
    pub image_id: String,
    pub source: ObjectRef,
    pub annotations: AnnotationSet,
    pub metadata: Map<String, Value>,
    pub repros: Vec<ReproductionOutcome>,
    pub duration_ms: f64,
}

impl ProcessingReport {
    pub fn failed_repros(&self) -> impl Iterator<Item = &ReproductionOutcome> {
        self.repros.iter().filter(|outcome| !outcome.is_success())
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
    annotations: AnnotationOrchestrator,
    extractor: MetadataExtractor,
    repros: ReproductionGenerator,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        documents: Arc<dyn DocumentStore>,
        annotator: Arc<dyn AnnotationService>,
        tool: Arc<dyn ImageTool>,
        settings: PipelineSettings,
    ) -> Self {
        let annotations =
            AnnotationOrchestrator::new(annotator, documents.clone(), settings.call_timeout);
        let extractor = MetadataExtractor::new(
            storage.clone(),
            documents.clone(),
            tool.clone(),
            settings.call_timeout,
        );
        let repros = ReproductionGenerator::new(
            storage,
            documents,
            tool,
            settings.derivatives.clone(),
            settings.download_url_host.clone(),
            settings.call_timeout,
        );

        Self {
            settings,
            annotations,
            extractor,
            repros,
        }
    }

    /// Process one upload event.
    #[tracing::instrument(skip(self, event), fields(bucket = %event.bucket, path = %event.path))]
    pub async fn process(&self, event: &UploadEvent) -> Result<PipelineOutcome, StageFailure> {
        let start = Instant::now();
        let result = self.run(event, start).await;

        match &result {
            Ok(PipelineOutcome::Rejected(reason)) => {
                tracing::info!(reason = %reason, "Upload skipped");
            }
            Ok(PipelineOutcome::Done(report)) => {
                tracing::info!(
                    image_id = %report.image_id,
                    repros_failed = report.failed_repros().count(),
                    duration_ms = report.duration_ms,
                    "Image processing complete"
                );
            }
            Err(failure) => log_failure(failure, start),
        }

        result
    }

    async fn run(
        &self,
        event: &UploadEvent,
        start: Instant,
    ) -> Result<PipelineOutcome, StageFailure> {
        enter(PipelineStage::Received);

        enter(PipelineStage::Guarded);
        if let GuardDecision::Reject(reason) = evaluate(
            event,
            &self.settings.derivatives,
            self.settings.enforce_first_generation,
        ) {
            return Ok(PipelineOutcome::Rejected(reason));
        }
        let image_id =
            image_id_of(event).map_err(|e| StageFailure::new(PipelineStage::Guarded, e))?;
        let source = event.source();

        enter(PipelineStage::Annotating);
        let annotations = self
            .annotations
            .annotate(image_id, &source)
            .await
            .map_err(|e| StageFailure::new(PipelineStage::Annotating, e))?;

        enter(PipelineStage::Extracting);
        let scratch = ScratchDir::create(&self.settings.scratch_root).map_err(|e| {
            StageFailure::new(
                PipelineStage::Extracting,
                PipelineError::Extraction(format!("Failed to create scratch directory: {}", e)),
            )
        })?;

        let local = self
            .process_locally(image_id, event, &source, &scratch)
            .await;

        enter(PipelineStage::CleaningUp);
        scratch.cleanup();

        let (metadata, repros) = local?;

        enter(PipelineStage::Done);
        Ok(PipelineOutcome::Done(ProcessingReport {
            image_id: image_id.to_string(),
            source,
            annotations,
            metadata,
            repros,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }))
    }

    /// Stages that need the local copy of the source.
    async fn process_locally(
        &self,
        image_id: &str,
        event: &UploadEvent,
        source: &ObjectRef,
        scratch: &ScratchDir,
    ) -> Result<(Map<String, Value>, Vec<ReproductionOutcome>), StageFailure> {
        let extracted = self
            .extractor
            .extract_metadata(image_id, source, scratch)
            .await
            .map_err(|e| StageFailure::new(PipelineStage::Extracting, e))?;

        enter(PipelineStage::GeneratingRepros);
        let repro_source = ReproductionSource {
            image_id,
            object: source,
            content_type: &event.content_type,
            local_path: &extracted.local_source,
        };
        let repros = self.repros.generate(&repro_source, scratch).await;

        Ok((extracted.record, repros))
    }
}

fn enter(stage: PipelineStage) {
    tracing::debug!(stage = %stage, "Entering stage");
}

/// Image identifier of an accepted event. Objects at the bucket root, and
/// paths whose last segment is not a usable file name, cannot be processed.
fn image_id_of(event: &UploadEvent) -> Result<&str, PipelineError> {
    let image_id = event.image_id().ok_or_else(|| {
        PipelineError::InvalidEvent(format!("{} is not inside an image folder", event.path))
    })?;

    match event.file_name() {
        "" | "." | ".." => Err(PipelineError::InvalidEvent(format!(
            "{} does not name a file",
            event.path
        ))),
        _ => Ok(image_id),
    }
}

fn log_failure(failure: &StageFailure, start: Instant) {
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    match failure.error.log_level() {
        LogLevel::Info => tracing::info!(
            stage = %failure.stage,
            error_code = failure.error.error_code(),
            error = %failure.error,
            duration_ms,
            "Image processing stopped"
        ),
        LogLevel::Warn => tracing::warn!(
            stage = %failure.stage,
            error_code = failure.error.error_code(),
            error = %failure.error,
            duration_ms,
            "Image processing stopped"
        ),
        LogLevel::Error => tracing::error!(
            stage = %failure.stage,
            error_code = failure.error.error_code(),
            error = %failure.error,
            duration_ms,
            "Image processing failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockAnnotator, MockImageTool, MockObjectStore, SAMPLE_REPORT};
    use pictura_core::constants::collections;
    use pictura_core::AnnotationKind;
    use pictura_db::MemoryDocumentStore;
    use serde_json::json;

    const BUCKET: &str = "media.appspot.com";

    struct Harness {
        storage: MockObjectStore,
        documents: MemoryDocumentStore,
        annotator: MockAnnotator,
        tool: MockImageTool,
        scratch_root: tempfile::TempDir,
        call_timeout: Duration,
    }

    impl Harness {
        fn new() -> Self {
            let storage = MockObjectStore::new();
            storage.insert(
                &ObjectRef::new(BUCKET, "abc/photo.jpg"),
                b"jpeg bytes",
                "image/jpeg",
            );
            Self {
                storage,
                documents: MemoryDocumentStore::new(),
                annotator: MockAnnotator::new(),
                tool: MockImageTool::new(SAMPLE_REPORT),
                scratch_root: tempfile::tempdir().unwrap(),
                call_timeout: Duration::from_secs(5),
            }
        }

        fn with_tool(mut self, tool: MockImageTool) -> Self {
            self.tool = tool;
            self
        }

        fn with_annotator(mut self, annotator: MockAnnotator) -> Self {
            self.annotator = annotator;
            self
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                Arc::new(self.storage.clone()),
                Arc::new(self.documents.clone()),
                Arc::new(self.annotator.clone()),
                Arc::new(self.tool.clone()),
                PipelineSettings {
                    derivatives: DEFAULT_DERIVATIVES.to_vec(),
                    scratch_root: self.scratch_root.path().to_path_buf(),
                    call_timeout: self.call_timeout,
                    enforce_first_generation: true,
                    download_url_host: "files.example.com".to_string(),
                },
            )
        }

        fn scratch_is_empty(&self) -> bool {
            std::fs::read_dir(self.scratch_root.path())
                .unwrap()
                .next()
                .is_none()
        }

        async fn document(&self, collection: &str) -> Option<Value> {
            self.documents.get(collection, "abc").await.unwrap()
        }
    }

    fn event(path: &str, content_type: &str) -> UploadEvent {
        UploadEvent {
            path: path.to_string(),
            bucket: BUCKET.to_string(),
            content_type: content_type.to_string(),
            generation_marker: 1,
        }
    }

    fn expect_done(outcome: Result<PipelineOutcome, StageFailure>) -> ProcessingReport {
        match outcome {
            Ok(PipelineOutcome::Done(report)) => report,
            other => panic!("expected a completed invocation, got {:?}", other),
        }
    }

    fn expect_failure(outcome: Result<PipelineOutcome, StageFailure>) -> StageFailure {
        match outcome {
            Err(failure) => failure,
            Ok(other) => panic!("expected a failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_run_writes_every_record() {
        let harness = Harness::new();

        let report = expect_done(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );

        assert_eq!(report.image_id, "abc");
        assert_eq!(report.failed_repros().count(), 0);
        assert_eq!(report.metadata["Colorspace"], "sRGB");

        let exif = harness.document(collections::EXIF).await.unwrap();
        assert_eq!(exif["Channel statistics"]["Red"]["min"], "0  (0)");
        for kind in AnnotationKind::ALL {
            let doc = harness.document(kind.collection()).await.unwrap();
            assert_eq!(doc[kind.field()]["kind"], kind.field());
        }

        let image = harness.document(collections::IMAGES).await.unwrap();
        assert_eq!(image["repros"]["thumbnail"], report.repros[0].url().unwrap());
        assert_eq!(image["repros"]["small"], report.repros[1].url().unwrap());

        assert_eq!(
            harness.storage.paths(),
            vec!["abc/photo.jpg", "abc/small_photo.jpg", "abc/thumb_photo.jpg"]
        );
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_non_image_rejected_without_side_effects() {
        let harness = Harness::new();

        let outcome = harness
            .pipeline()
            .process(&event("abc/notes.pdf", "application/pdf"))
            .await;

        assert!(matches!(
            outcome,
            Ok(PipelineOutcome::Rejected(RejectReason::NotAnImage))
        ));
        assert!(harness.annotator.calls().is_empty());
        assert!(harness.tool.calls().is_empty());
        assert!(harness.document(collections::EXIF).await.is_none());
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_derivative_upload_rejected() {
        let harness = Harness::new();

        let outcome = harness
            .pipeline()
            .process(&event("abc/thumb_photo.jpg", "image/jpeg"))
            .await;

        assert!(matches!(
            outcome,
            Ok(PipelineOutcome::Rejected(RejectReason::IsDerivative))
        ));
        assert!(harness.annotator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_update_rejected() {
        let harness = Harness::new();
        let mut ev = event("abc/photo.jpg", "image/jpeg");
        ev.generation_marker = 2;

        let outcome = harness.pipeline().process(&ev).await;
        assert!(matches!(
            outcome,
            Ok(PipelineOutcome::Rejected(RejectReason::NotFirstGeneration))
        ));
    }

    #[tokio::test]
    async fn test_root_level_object_is_invalid() {
        let harness = Harness::new();

        let failure = expect_failure(
            harness
                .pipeline()
                .process(&event("photo.jpg", "image/jpeg"))
                .await,
        );

        assert_eq!(failure.stage, PipelineStage::Guarded);
        assert!(matches!(failure.error, PipelineError::InvalidEvent(_)));
        assert!(harness.annotator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_small_failure_does_not_block_thumbnail() {
        let harness =
            Harness::new().with_tool(MockImageTool::new(SAMPLE_REPORT).failing_transform("small"));

        let report = expect_done(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );

        let failed: Vec<&ReproductionOutcome> = report.failed_repros().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "small");
        assert!(matches!(
            failed[0].result,
            Err(PipelineError::Reproduction { ref name, .. }) if name == "small"
        ));

        let image = harness.document(collections::IMAGES).await.unwrap();
        assert!(image["repros"]["thumbnail"].is_string());
        assert!(image["repros"].get("small").is_none());
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_repro_merge_is_additive() {
        let harness = Harness::new();
        harness
            .documents
            .replace(
                collections::IMAGES,
                "abc",
                json!({ "caption": "Harbour at dawn", "active": true }),
            )
            .await
            .unwrap();

        expect_done(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );

        let image = harness.document(collections::IMAGES).await.unwrap();
        assert_eq!(image["caption"], "Harbour at dawn");
        assert_eq!(image["active"], true);
        let repros = image["repros"].as_object().unwrap();
        assert!(repros.contains_key("thumbnail") && repros.contains_key("small"));
    }

    #[tokio::test]
    async fn test_reprocessing_replaces_documents() {
        let first = Harness::new();
        expect_done(
            first
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );
        assert!(first.document(collections::EXIF).await.unwrap()["Properties"].is_object());

        let second = Harness {
            storage: first.storage.clone(),
            documents: first.documents.clone(),
            ..Harness::new()
        }
        .with_annotator(MockAnnotator::new().with_tag("second"))
        .with_tool(MockImageTool::new(
            "Image: photo.jpg\n  Format: PNG\n  Geometry: 10x10+0+0\n",
        ));
        expect_done(
            second
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );

        assert_eq!(
            second.document(collections::EXIF).await.unwrap(),
            json!({ "Format": "PNG", "Geometry": "10x10+0+0" })
        );
        let source = ObjectRef::new(BUCKET, "abc/photo.jpg");
        for kind in AnnotationKind::ALL {
            assert_eq!(
                second.document(kind.collection()).await.unwrap(),
                json!({ kind.field(): MockAnnotator::tagged_payload(kind, &source, "second") })
            );
        }
    }

    #[tokio::test]
    async fn test_annotation_failure_halts_before_extraction() {
        let harness =
            Harness::new().with_annotator(MockAnnotator::new().failing(AnnotationKind::Labels));

        let failure = expect_failure(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );

        assert_eq!(failure.stage, PipelineStage::Annotating);
        assert!(harness.tool.calls().is_empty());
        // Sibling annotations are kept
        assert!(harness
            .document(collections::SAFE_SEARCH)
            .await
            .is_some());
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_scratch_removed_on_extraction_failures() {
        // Missing source object
        let harness = Harness::new();
        let failure = expect_failure(
            harness
                .pipeline()
                .process(&event("abc/other.jpg", "image/jpeg"))
                .await,
        );
        assert_eq!(failure.stage, PipelineStage::Extracting);
        assert!(matches!(failure.error, PipelineError::Extraction(_)));
        assert!(harness.scratch_is_empty());

        // Introspection tool failure
        let harness =
            Harness::new().with_tool(MockImageTool::new(SAMPLE_REPORT).failing_identify());
        let failure = expect_failure(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );
        assert!(matches!(failure.error, PipelineError::Extraction(_)));
        assert!(harness.scratch_is_empty());

        // Malformed report
        let harness = Harness::new().with_tool(MockImageTool::new("Image:\n Format: JPEG\n"));
        let failure = expect_failure(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );
        assert!(matches!(failure.error, PipelineError::Parse(_)));
        assert!(harness.tool.calls() == vec!["identify".to_string()]);
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_stalled_tool_times_out_and_cleans_up() {
        let mut harness = Harness::new()
            .with_tool(MockImageTool::new(SAMPLE_REPORT).with_delay(Duration::from_secs(10)));
        harness.call_timeout = Duration::from_millis(50);

        let failure = expect_failure(
            harness
                .pipeline()
                .process(&event("abc/photo.jpg", "image/jpeg"))
                .await,
        );

        assert_eq!(failure.stage, PipelineStage::Extracting);
        assert!(matches!(
            failure.error,
            PipelineError::Timeout { ref operation, .. } if operation == "identify"
        ));
        assert!(harness.scratch_is_empty());
    }

    #[test]
    fn test_settings_from_config() {
        let config = PipelineConfig {
            environment: "test".to_string(),
            storage_backend: pictura_core::StorageBackend::Local,
            local_storage_path: PathBuf::from("/tmp/objects"),
            gcs_api_base: "https://storage.googleapis.com".to_string(),
            gcs_access_token: None,
            download_url_host: "cdn.example.com".to_string(),
            document_backend: pictura_core::DocumentBackend::Memory,
            database_url: None,
            db_max_connections: 5,
            vision_api_key: "key".to_string(),
            vision_endpoint: "https://vision.googleapis.com".to_string(),
            identify_path: "identify".to_string(),
            convert_path: "convert".to_string(),
            scratch_dir: PathBuf::from("/var/tmp/pictura"),
            external_call_timeout_secs: 30,
            enforce_first_generation: false,
            max_concurrent_events: 2,
            log_format: "json".to_string(),
        };

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.call_timeout, Duration::from_secs(30));
        assert_eq!(settings.scratch_root, PathBuf::from("/var/tmp/pictura"));
        assert!(!settings.enforce_first_generation);
        assert_eq!(settings.derivatives.len(), 2);
    }
}
