//! Bounded retry with exponential backoff and a per-call timeout

use crate::error::{CloudError, Result};
use crate::provider::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Runs `call` until it succeeds, fails with a non-transient error, or
/// `retry.max_attempts` is reached. Each attempt is bounded by `timeout`;
/// a timeout ends the loop with `CloudError::Timeout`.
pub async fn call_with_retry<T, F, Fut>(
    retry: &RetryConfig,
    timeout: Duration,
    what: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CloudError::Timeout(format!(
                "{} did not complete within {:?}",
                what, timeout
            ))),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
