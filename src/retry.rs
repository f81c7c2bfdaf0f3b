/// Fixed-interval retry for polling the manager until a condition holds
use crate::constants::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::{is_retryable, Result, ScaleTestError};
use std::future::Future;
use std::time::Duration;

/// Retry configuration for polling operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            wait: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, wait: Duration) -> Self {
        Self { max_attempts, wait }
    }
}

/// Run `op` until it succeeds, sleeping `policy.wait` between attempts.
///
/// Non-retryable errors are returned as-is. When every attempt fails the
/// last error is wrapped in [`ScaleTestError::RetryExhausted`].
pub async fn retry_fixed<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(what, attempt, "Condition met after retries");
                }
                return Ok(value);
            }
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) if attempt >= max_attempts => {
                return Err(ScaleTestError::RetryExhausted {
                    what: what.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                tracing::info!(
                    what,
                    attempt,
                    max_attempts,
                    wait_ms = policy.wait.as_millis() as u64,
                    error = %err,
                    "Not ready yet, retrying"
                );
                tokio::time::sleep(policy.wait).await;
            }
        }
    }
}
