//! Metadata stage: materialize the source locally, introspect it and store
//! the parsed report as the image's exif record.

use pictura_core::constants::collections;
use pictura_core::{ObjectRef, PipelineError};
use pictura_db::DocumentStore;
use pictura_storage::ObjectStore;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::scratch::ScratchDir;
use crate::text_tree::parse_indented_report;
use crate::timeout::bounded;
use crate::tools::ImageTool;

#[derive(Debug, Clone)]
pub struct ExtractedMetadata {
    /// Parsed report, as stored in the `exif` collection.
    pub record: Map<String, Value>,
    /// Local copy of the source, reused by the reproduction stage.
    pub local_source: PathBuf,
}

pub struct MetadataExtractor {
    storage: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    tool: Arc<dyn ImageTool>,
    call_timeout: Duration,
}

impl MetadataExtractor {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        documents: Arc<dyn DocumentStore>,
        tool: Arc<dyn ImageTool>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            documents,
            tool,
            call_timeout,
        }
    }

    #[tracing::instrument(skip(self, image_id, source, scratch), fields(image_id = %image_id, source = %source))]
    pub async fn extract_metadata(
        &self,
        image_id: &str,
        source: &ObjectRef,
        scratch: &ScratchDir,
    ) -> Result<ExtractedMetadata, PipelineError> {
        let start = std::time::Instant::now();
        let local_source = scratch.file(source.file_name());

        let size = bounded(
            "source download",
            self.call_timeout,
            self.storage.download(source, &local_source),
        )
        .await?
        .map_err(|e| PipelineError::Extraction(format!("Failed to download source: {}", e)))?;

        let report = bounded(
            "identify",
            self.call_timeout,
            self.tool.identify(&local_source),
        )
        .await?
        .map_err(|e| PipelineError::Extraction(e.to_string()))?;

        let record = parse_indented_report(&report)?;

        bounded(
            "exif write",
            self.call_timeout,
            self.documents
                .replace(collections::EXIF, image_id, Value::Object(record.clone())),
        )
        .await?
        .map_err(|e| PipelineError::Extraction(format!("Failed to store exif record: {}", e)))?;

        tracing::info!(
            image_id = %image_id,
            size_bytes = size,
            fields = record.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Exif metadata stored"
        );

        Ok(ExtractedMetadata {
            record,
            local_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockImageTool, MockObjectStore, SAMPLE_REPORT};
    use pictura_db::MemoryDocumentStore;

    struct Fixture {
        storage: MockObjectStore,
        documents: MemoryDocumentStore,
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = MockObjectStore::new();
            storage.insert(&ObjectRef::new("media", "abc/photo.jpg"), b"jpeg", "image/jpeg");
            Self {
                storage,
                documents: MemoryDocumentStore::new(),
                root: tempfile::tempdir().unwrap(),
            }
        }

        fn extractor(&self, tool: MockImageTool) -> MetadataExtractor {
            MetadataExtractor::new(
                Arc::new(self.storage.clone()),
                Arc::new(self.documents.clone()),
                Arc::new(tool),
                Duration::from_secs(5),
            )
        }
    }

    #[tokio::test]
    async fn test_extract_stores_parsed_report() {
        let fixture = Fixture::new();
        let scratch = ScratchDir::create(fixture.root.path()).unwrap();

        let extracted = fixture
            .extractor(MockImageTool::new(SAMPLE_REPORT))
            .extract_metadata("abc", &ObjectRef::new("media", "abc/photo.jpg"), &scratch)
            .await
            .unwrap();

        assert_eq!(extracted.local_source, scratch.file("photo.jpg"));
        assert_eq!(tokio::fs::read(&extracted.local_source).await.unwrap(), b"jpeg");
        let stored = fixture.documents.get("exif", "abc").await.unwrap().unwrap();
        assert_eq!(stored, Value::Object(extracted.record));
        assert_eq!(stored["Image"]["Geometry"], "800x600+0+0");
    }

    #[tokio::test]
    async fn test_missing_source_is_extraction_error() {
        let fixture = Fixture::new();
        let scratch = ScratchDir::create(fixture.root.path()).unwrap();

        let err = fixture
            .extractor(MockImageTool::new(SAMPLE_REPORT))
            .extract_metadata("abc", &ObjectRef::new("media", "abc/missing.jpg"), &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_tool_failure_is_extraction_error() {
        let fixture = Fixture::new();
        let scratch = ScratchDir::create(fixture.root.path()).unwrap();

        let err = fixture
            .extractor(MockImageTool::new(SAMPLE_REPORT).failing_identify())
            .extract_metadata("abc", &ObjectRef::new("media", "abc/photo.jpg"), &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(_)));
        assert!(fixture.documents.get("exif", "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_report_is_parse_error() {
        let fixture = Fixture::new();
        let scratch = ScratchDir::create(fixture.root.path()).unwrap();

        let err = fixture
            .extractor(MockImageTool::new("Image: x\n   Format: JPEG\n"))
            .extract_metadata("abc", &ObjectRef::new("media", "abc/photo.jpg"), &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }
}
