//! Pictura image-processing pipeline
//!
//! Turns an object-finalized upload event into annotation records, an exif
//! record and a set of derivative renditions:
//!
//! - [`guard`] decides whether an event enters the pipeline at all
//! - [`text_tree`] parses `identify -verbose` style reports
//! - [`annotate`], [`exif`] and [`repro`] are the three processing stages
//! - [`pipeline`] sequences them over one event with a scoped scratch area
//! - [`purge`] removes everything an image left behind

pub mod annotate;
pub mod exif;
pub mod guard;
pub mod pipeline;
pub mod purge;
pub mod repro;
pub mod scratch;
pub mod text_tree;
pub mod timeout;
pub mod tools;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use annotate::{AnnotationOrchestrator, AnnotationSet};
pub use exif::{ExtractedMetadata, MetadataExtractor};
pub use guard::{evaluate, should_process, GuardDecision};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineSettings, ProcessingReport};
pub use purge::{ImagePurger, PurgeError, PurgeReport};
pub use repro::{ReproductionGenerator, ReproductionOutcome, ReproductionSource};
pub use scratch::{remove_if_exists, ScratchDir};
pub use text_tree::parse_indented_report;
pub use tools::{ImageMagick, ImageTool, ToolError};
