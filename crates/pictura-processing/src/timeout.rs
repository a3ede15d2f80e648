use pictura_core::PipelineError;
use std::future::Future;
use std::time::Duration;

/// Await an external call, failing with [`PipelineError::Timeout`] once
/// `limit` elapses. The inner future is dropped on expiry, which kills any
/// child process spawned with `kill_on_drop`.
pub async fn bounded<F, T>(operation: &str, limit: Duration, call: F) -> Result<T, PipelineError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| PipelineError::Timeout {
            operation: operation.to_string(),
            limit,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded("noop", Duration::from_secs(1), async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded("identify", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout { ref operation, limit }
                if operation == "identify" && limit == Duration::from_millis(10)
        ));
        assert_eq!(err.to_string(), "identify timed out after 10ms");
    }
}
