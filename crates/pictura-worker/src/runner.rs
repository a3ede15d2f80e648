//! Bounded-concurrency execution of a batch of events.

use pictura_core::UploadEvent;
use pictura_processing::{Pipeline, PipelineOutcome};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Derivatives that failed inside otherwise completed invocations.
    pub repro_failures: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Run every event through the pipeline, at most `max_concurrent` at a time.
/// Invocations are independent: a failure is counted and the batch goes on.
pub async fn run_events(
    pipeline: Arc<Pipeline>,
    events: Vec<UploadEvent>,
    max_concurrent: usize,
) -> RunSummary {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    for event in events {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let pipeline = pipeline.clone();
        tasks.spawn(async move {
            let _permit = permit;
            pipeline.process(&event).await
        });
    }

    let mut summary = RunSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(PipelineOutcome::Done(report))) => {
                summary.processed += 1;
                summary.repro_failures += report.failed_repros().count();
            }
            Ok(Ok(PipelineOutcome::Rejected(_))) => summary.rejected += 1,
            // Already logged by the pipeline
            Ok(Err(_)) => summary.failed += 1,
            Err(e) => {
                tracing::error!(error = %e, "Pipeline task panicked or was cancelled");
                summary.failed += 1;
            }
        }
    }

    summary
}
