//! Pictura worker: runs the image-processing pipeline over batches of
//! upload events and hosts the maintenance commands.

pub mod context;
pub mod events;
pub mod runner;
pub mod telemetry;

pub use context::WorkerContext;
pub use events::{parse_event_lines, EventBatch, InvalidEvent};
pub use runner::{run_events, RunSummary};
pub use telemetry::init_tracing;
