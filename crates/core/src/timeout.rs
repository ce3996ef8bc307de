use perps_chain::{ChainError, ChainResult};
use std::future::Future;
use std::time::Duration;

/// Bound an external call; running out of time is a `ChainError::Timeout`.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = ChainResult<T>>,
) -> ChainResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout(limit)),
    }
}
