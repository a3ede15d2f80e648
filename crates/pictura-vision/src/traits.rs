use async_trait::async_trait;
use pictura_core::{AnnotationKind, ObjectRef};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Annotation request failed: {0}")]
    RequestFailed(String),

    #[error("Annotation API returned {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Annotation API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Invalid annotation response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type VisionResult<T> = Result<T, VisionError>;

/// Annotation service
///
/// One call detects one [`AnnotationKind`] for an image that is already in
/// the object store. The returned payload is opaque to the pipeline and is
/// persisted as-is; a kind the service has nothing to say about yields
/// `Value::Null`.
#[async_trait]
pub trait AnnotationService: Send + Sync {
    async fn detect(&self, kind: AnnotationKind, source: &ObjectRef) -> VisionResult<Value>;
}
