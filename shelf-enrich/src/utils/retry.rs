//! Bounded retry with a fixed inter-attempt delay
//!
//! Every source adapter funnels its retries through `retry_with_delay`, so the
//! attempt ceiling and delay are the only knobs and they come from config.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt ceiling and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1)
    pub max_attempts: u32,
    /// Sleep between a failed attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy from config values in milliseconds
    pub fn from_millis(max_attempts: u32, delay_ms: u64) -> Self {
        Self::new(max_attempts, Duration::from_millis(delay_ms))
    }

    /// Single attempt, no retry
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 1 second apart
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Run `operation` until it succeeds, returns a non-retryable error, or the
/// attempt ceiling is reached.
///
/// `operation` receives the 1-based attempt number. `should_retry` decides
/// whether an error is worth another attempt; the last error is returned
/// once the policy is exhausted.
pub async fn retry_with_delay<F, Fut, T, E, P>(
    operation_name: &str,
    policy: RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if !should_retry(&err) {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Giving up: retry attempts exhausted"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, will retry after delay"
                );

                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result: Result<i32, String> =
            retry_with_delay("test_op", RetryPolicy::default(), |_| true, |_| async {
                Ok(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_succeeds_after_retryable_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<&str, String> = retry_with_delay(
            "test_op",
            RetryPolicy::new(3, Duration::ZERO),
            |_| true,
            move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("transient failure {}", attempt))
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_attempt_ceiling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> = retry_with_delay(
            "test_op",
            RetryPolicy::new(3, Duration::ZERO),
            |_| true,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("always fails".to_string()) }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "always fails");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> = retry_with_delay(
            "test_op",
            RetryPolicy::new(5, Duration::ZERO),
            |e: &String| e.contains("transient"),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("permanent".to_string()) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fixed_delay_between_attempts() {
        let start = std::time::Instant::now();

        let _: Result<(), String> = retry_with_delay(
            "test_op",
            RetryPolicy::new(3, Duration::from_millis(50)),
            |_| true,
            |_| async { Err("fail".to_string()) },
        )
        .await;

        // Two sleeps between three attempts
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_policy_minimum_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::once().max_attempts, 1);
    }
}
