//! Error types module
//!
//! Errors raised while processing a single upload event. Collaborator crates
//! (storage, documents, annotation, tools) keep their own error enums; the
//! processing crate folds them into [`PipelineError`] at the stage boundary so
//! the coordinator can report which stage failed.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::models::AnnotationKind;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected outcomes such as skipped events
    Info,
    /// Recoverable or partial failures
    Warn,
    /// Failures that halt an invocation
    Error,
}

/// Why the upload guard declined an event. A normal skip, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotAnImage,
    NotFirstGeneration,
    IsDerivative,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RejectReason::NotAnImage => write!(f, "not an image"),
            RejectReason::NotFirstGeneration => write!(f, "not a new image"),
            RejectReason::IsDerivative => write!(f, "is a reproduction"),
        }
    }
}

/// Malformed text-tree report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Report contains no lines after the header")]
    Empty,

    #[error("Line {line}: indentation changed by {delta} columns, expected a multiple of 2")]
    OddIndentation { line: usize, delta: isize },

    #[error("Line {line}: dedent closes {closing} sections but only {open} are open")]
    UnbalancedDedent {
        line: usize,
        closing: usize,
        open: usize,
    },

    #[error("Line {line}: expected `key: value` or `section:`, got {content:?}")]
    MalformedLine { line: usize, content: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid upload event: {0}")]
    InvalidEvent(String),

    #[error("Metadata report rejected: {0}")]
    Parse(#[from] ParseError),

    #[error("Metadata extraction failed: {0}")]
    Extraction(String),

    #[error("Annotation `{kind}` failed: {message}")]
    Annotation {
        kind: AnnotationKind,
        message: String,
    },

    #[error("Reproduction `{name}` failed: {message}")]
    Reproduction { name: String, message: String },

    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },
}

impl PipelineError {
    /// Reproduction failures are scoped to one derivative and leave the
    /// invocation running; everything else halts it.
    pub fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::Reproduction { .. } => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::InvalidEvent(_) => "INVALID_EVENT",
            PipelineError::Parse(_) => "PARSE_ERROR",
            PipelineError::Extraction(_) => "EXTRACTION_ERROR",
            PipelineError::Annotation { .. } => "ANNOTATION_ERROR",
            PipelineError::Reproduction { .. } => "REPRODUCTION_ERROR",
            PipelineError::Timeout { .. } => "TIMEOUT",
        }
    }
}

/// Stages of a single pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Guarded,
    Annotating,
    Extracting,
    GeneratingRepros,
    CleaningUp,
    Done,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Guarded => "guarded",
            PipelineStage::Annotating => "annotating",
            PipelineStage::Extracting => "extracting",
            PipelineStage::GeneratingRepros => "generating_repros",
            PipelineStage::CleaningUp => "cleaning_up",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A non-tolerated error together with the stage it halted.
#[derive(Debug, thiserror::Error)]
#[error("Pipeline failed while {stage}: {error}")]
pub struct StageFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
}

impl StageFailure {
    pub fn new(stage: PipelineStage, error: PipelineError) -> Self {
        Self { stage, error }
    }
}
