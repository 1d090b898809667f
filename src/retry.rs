//! Bounded retry for transient failures.
//!
//! Attempts run strictly sequentially - the next one starts only after the
//! previous has failed - so a wrapped operation with side effects (a login
//! submission, say) is never duplicated in flight.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default attempt budget for wrapped calls
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts
const RETRY_DELAY_MS: u64 = 250;

/// Run `op` up to `attempts` times, returning the first success or the last
/// failure once the budget is exhausted. A budget of zero behaves like one.
pub async fn retry<T, E, F, Fut>(attempts: u32, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(attempts, |_| true, op).await
}

/// Like [`retry`], but gives up early when `is_retryable` says the failure
/// is not worth another attempt.
pub async fn retry_if<T, E, P, F, Fut>(
    attempts: u32,
    mut is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    P: FnMut(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts || !is_retryable(&e) => return Err(e),
            Err(e) => {
                warn!(attempt, max = attempts, error = %e, "attempt failed, retrying");
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
        }
    }
}
