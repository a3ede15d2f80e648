//! Mock object store, image tool and annotation service.

use async_trait::async_trait;
use pictura_core::{AnnotationKind, DerivativeSpec, ObjectRef, StorageBackend};
use pictura_storage::{ObjectMetadata, ObjectStore, StorageError, StorageResult, StoredObject};
use pictura_vision::{AnnotationService, VisionError, VisionResult};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::tools::{ImageTool, ToolError};

#[derive(Clone)]
struct StoredBlob {
    data: Vec<u8>,
    metadata: ObjectMetadata,
}

/// Object store backed by a map, with per-path upload failures.
#[derive(Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<ObjectRef, StoredBlob>>>,
    failing_uploads: Arc<Mutex<HashSet<String>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object: &ObjectRef, data: &[u8], content_type: &str) {
        self.objects.lock().unwrap().insert(
            object.clone(),
            StoredBlob {
                data: data.to_vec(),
                metadata: ObjectMetadata {
                    content_type: content_type.to_string(),
                    size_bytes: data.len() as u64,
                    download_token: None,
                },
            },
        );
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.objects.lock().unwrap().contains_key(object)
    }

    pub fn metadata_of(&self, object: &ObjectRef) -> Option<ObjectMetadata> {
        self.objects
            .lock()
            .unwrap()
            .get(object)
            .map(|blob| blob.metadata.clone())
    }

    /// Sorted paths of every stored object.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .map(|object| object.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Make uploads to `path` fail.
    pub fn fail_uploads_to(&self, path: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .insert(path.to_string());
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn download(&self, object: &ObjectRef, destination: &Path) -> StorageResult<u64> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(object)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| StorageError::NotFound(object.to_string()))?;
        tokio::fs::write(destination, &data).await?;
        Ok(data.len() as u64)
    }

    async fn upload(
        &self,
        source: &Path,
        destination: &ObjectRef,
        content_type: &str,
        download_token: &str,
    ) -> StorageResult<StoredObject> {
        if self
            .failing_uploads
            .lock()
            .unwrap()
            .contains(&destination.path)
        {
            return Err(StorageError::UploadFailed(format!(
                "mock upload failure for {}",
                destination
            )));
        }

        let data = tokio::fs::read(source).await?;
        let size_bytes = data.len() as u64;
        self.objects.lock().unwrap().insert(
            destination.clone(),
            StoredBlob {
                data,
                metadata: ObjectMetadata {
                    content_type: content_type.to_string(),
                    size_bytes,
                    download_token: Some(download_token.to_string()),
                },
            },
        );

        Ok(StoredObject {
            object: destination.clone(),
            content_type: content_type.to_string(),
            download_token: download_token.to_string(),
            size_bytes,
        })
    }

    async fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(object)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(object.to_string()))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Image tool that returns a canned report and writes placeholder derivatives.
#[derive(Clone)]
pub struct MockImageTool {
    report: String,
    fail_identify: bool,
    failing_transforms: HashSet<String>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockImageTool {
    pub fn new(report: &str) -> Self {
        Self {
            report: report.to_string(),
            fail_identify: false,
            failing_transforms: HashSet::new(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_identify(mut self) -> Self {
        self.fail_identify = true;
        self
    }

    /// Fail the transform for the derivative named `name`.
    pub fn failing_transform(mut self, name: &str) -> Self {
        self.failing_transforms.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `identify` or `convert <name>` for every call made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ImageTool for MockImageTool {
    async fn identify(&self, _source: &Path) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push("identify".to_string());
        self.pause().await;
        if self.fail_identify {
            return Err(ToolError::Failed {
                program: "identify".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "identify: improper image header".to_string(),
            });
        }
        Ok(self.report.clone())
    }

    async fn transform(
        &self,
        _source: &Path,
        output: &Path,
        spec: &DerivativeSpec,
    ) -> Result<(), ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("convert {}", spec.name));
        self.pause().await;
        if self.failing_transforms.contains(spec.name) {
            return Err(ToolError::Failed {
                program: "convert".to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("convert: unable to write {}", output.display()),
            });
        }
        tokio::fs::write(output, format!("{} {}", spec.name, spec.geometry()))
            .await
            .map_err(|source| ToolError::Spawn {
                program: "convert".to_string(),
                source,
            })
    }
}

/// Annotation service returning a deterministic payload per kind.
#[derive(Clone)]
pub struct MockAnnotator {
    tag: String,
    failing: HashSet<AnnotationKind>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<AnnotationKind>>>,
}

impl MockAnnotator {
    pub fn new() -> Self {
        Self {
            tag: "default".to_string(),
            failing: HashSet::new(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(mut self, kind: AnnotationKind) -> Self {
        self.failing.insert(kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Distinguishes payloads produced by different annotator instances.
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn calls(&self) -> Vec<AnnotationKind> {
        self.calls.lock().unwrap().clone()
    }

    pub fn payload(kind: AnnotationKind, source: &ObjectRef) -> Value {
        Self::tagged_payload(kind, source, "default")
    }

    pub fn tagged_payload(kind: AnnotationKind, source: &ObjectRef, tag: &str) -> Value {
        json!({
            "kind": kind.field(),
            "imageUri": source.gs_uri(),
            "tag": tag,
        })
    }
}

impl Default for MockAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnnotationService for MockAnnotator {
    async fn detect(&self, kind: AnnotationKind, source: &ObjectRef) -> VisionResult<Value> {
        self.calls.lock().unwrap().push(kind);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&kind) {
            return Err(VisionError::HttpStatus {
                status: 503,
                body: format!("mock {} failure", kind),
            });
        }
        Ok(Self::tagged_payload(kind, source, &self.tag))
    }
}
