//! Upload guard: decides whether an object-finalized event enters the pipeline.

use pictura_core::constants::{FIRST_GENERATION, IMAGE_CONTENT_TYPE_PREFIX};
use pictura_core::{DerivativeSpec, RejectReason, UploadEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Accept,
    Reject(RejectReason),
}

/// Evaluate the guard rules in order; the first match decides.
///
/// With `enforce_first_generation` off, metadata updates on existing objects
/// are processed like fresh uploads.
pub fn evaluate(
    event: &UploadEvent,
    derivatives: &[DerivativeSpec],
    enforce_first_generation: bool,
) -> GuardDecision {
    if !event.content_type.starts_with(IMAGE_CONTENT_TYPE_PREFIX) {
        return GuardDecision::Reject(RejectReason::NotAnImage);
    }

    if enforce_first_generation && event.generation_marker != FIRST_GENERATION {
        return GuardDecision::Reject(RejectReason::NotFirstGeneration);
    }

    let file_name = event.file_name();
    if derivatives
        .iter()
        .any(|spec| file_name.starts_with(spec.filename_prefix))
    {
        return GuardDecision::Reject(RejectReason::IsDerivative);
    }

    GuardDecision::Accept
}

/// `true` when the event should be processed, with first-generation
/// enforcement on.
pub fn should_process(event: &UploadEvent, derivatives: &[DerivativeSpec]) -> bool {
    evaluate(event, derivatives, true) == GuardDecision::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictura_core::DEFAULT_DERIVATIVES;

    fn event(path: &str, content_type: &str, marker: i64) -> UploadEvent {
        UploadEvent {
            path: path.to_string(),
            bucket: "media".to_string(),
            content_type: content_type.to_string(),
            generation_marker: marker,
        }
    }

    #[test]
    fn test_accepts_fresh_image() {
        assert!(should_process(
            &event("abc/photo.jpg", "image/jpeg", 1),
            DEFAULT_DERIVATIVES
        ));
    }

    #[test]
    fn test_rejects_non_images() {
        for content_type in ["application/pdf", "video/mp4", "text/plain", ""] {
            let ev = event("abc/file.bin", content_type, 1);
            assert!(!should_process(&ev, DEFAULT_DERIVATIVES));
            assert_eq!(
                evaluate(&ev, DEFAULT_DERIVATIVES, false),
                GuardDecision::Reject(RejectReason::NotAnImage)
            );
        }
    }

    #[test]
    fn test_rejects_metadata_updates() {
        let ev = event("abc/photo.jpg", "image/png", 2);
        assert_eq!(
            evaluate(&ev, DEFAULT_DERIVATIVES, true),
            GuardDecision::Reject(RejectReason::NotFirstGeneration)
        );
        assert_eq!(
            evaluate(&ev, DEFAULT_DERIVATIVES, false),
            GuardDecision::Accept
        );
    }

    #[test]
    fn test_rejects_derivatives() {
        for path in ["abc/thumb_photo.jpg", "abc/small_photo.jpg"] {
            let ev = event(path, "image/jpeg", 1);
            assert!(!should_process(&ev, DEFAULT_DERIVATIVES));
            assert_eq!(
                evaluate(&ev, DEFAULT_DERIVATIVES, true),
                GuardDecision::Reject(RejectReason::IsDerivative)
            );
        }
        // Only the file name is checked, not the folder
        assert!(should_process(
            &event("thumb_abc/photo.jpg", "image/jpeg", 1),
            DEFAULT_DERIVATIVES
        ));
    }

    #[test]
    fn test_content_type_checked_first() {
        assert_eq!(
            evaluate(&event("abc/thumb_x.txt", "text/plain", 5), DEFAULT_DERIVATIVES, true),
            GuardDecision::Reject(RejectReason::NotAnImage)
        );
    }
}
