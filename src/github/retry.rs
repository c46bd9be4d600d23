// Retry logic for idempotent GitHub API operations.
// Only rate limiting and server-side failures are retried; everything else is returned as-is.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::errors::ForgeError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the given (zero-based) failed attempt: 1s, 2s, 4s with the defaults.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    policy: RetryPolicy,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `attempt` until it succeeds, fails permanently, or the attempts run out.
    /// Backoff sleeps are interrupted by cancellation.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> Result<T, ForgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ForgeError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut tries = 0;

        loop {
            match attempt().await {
                Ok(value) => {
                    if tries > 0 {
                        debug!(operation, attempts = tries + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if self.should_retry(&err) && tries + 1 < max_attempts => {
                    let delay = self.policy.backoff(tries);
                    warn!(
                        operation,
                        attempt = tries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retryable GitHub API failure"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(ForgeError::Cancelled { operation: operation.to_string() });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    tries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn should_retry(&self, error: &ForgeError) -> bool {
        error.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::errors::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn api_error(status: u16) -> ForgeError {
        ForgeError::Api(ApiError::new("op", status, "GET", "/x", "boom"))
    }

    fn fast_handler() -> RetryHandler {
        RetryHandler::new(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        })
    }

    #[test]
    fn default_backoff_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_handler()
            .execute("op", &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(api_error(503))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast_handler()
            .execute("op", &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(api_error(429))
                }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast_handler()
            .execute("op", &CancellationToken::new(), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(api_error(422))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let handler = RetryHandler::new(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = handler
            .execute("op", &cancel, || async { Err(api_error(500)) })
            .await;

        assert!(matches!(result, Err(ForgeError::Cancelled { .. })));
    }
}
