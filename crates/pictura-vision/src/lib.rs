//! Pictura annotation service
//!
//! Image annotation (labels, safe-search classification, web detection)
//! behind the [`AnnotationService`] trait, with a Google Cloud Vision backend.

#[cfg(feature = "annotator-google-vision")]
pub mod google_vision;
pub mod traits;

#[cfg(feature = "annotator-google-vision")]
pub use google_vision::GoogleVisionAnnotator;
pub use pictura_core::AnnotationKind;
pub use traits::{AnnotationService, VisionError, VisionResult};
