//! Pictura Core Library
//!
//! This crate provides the domain models, derivative registry, error taxonomy and
//! configuration shared by every Pictura component.

pub mod config;
pub mod constants;
pub mod derivatives;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use derivatives::{DerivativeSpec, ResizeMode, DEFAULT_DERIVATIVES};
pub use error::{LogLevel, ParseError, PipelineError, PipelineStage, RejectReason, StageFailure};
pub use models::{AnnotationKind, ObjectRef, UploadEvent};
pub use storage_types::{DocumentBackend, StorageBackend};
