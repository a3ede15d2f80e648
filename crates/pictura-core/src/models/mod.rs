//! Domain models for the image-processing pipeline.

mod annotation;
mod event;

pub use annotation::AnnotationKind;
pub use event::{ObjectRef, UploadEvent};
