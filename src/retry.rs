//! Retry with exponential backoff for upstream calls.
//!
//! A [`RetryPolicy`] bundles the attempt budget, the backoff curve and the
//! predicate deciding which errors are worth another attempt. Attempts are strictly
//! sequential: attempt N+1 starts only after attempt N resolved and the backoff
//! sleep finished.

use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    /// Backoff multiplier (2.0 doubles the delay each attempt).
    pub multiplier: f64,
    /// Add 0-25% random jitter to each delay.
    pub jitter: bool,
    /// Decides whether an error is worth another attempt.
    pub retry_on: fn(&Error) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
            retry_on: Error::is_retryable,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Short delays, for tests and local upstreams.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(200),
            ..Self::default()
        }
    }

    /// Calculates the delay after the given zero-based failed attempt.
    #[must_use]
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let final_secs = if self.jitter {
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };

        Duration::from_secs_f64(final_secs)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The last error is returned on failure.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !(self.retry_on)(&e) {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            error = %e,
                            "Operation failed with non-retryable error"
                        );
                        return Err(e);
                    }

                    if attempt + 1 >= max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            error = %e,
                            "Operation failed after exhausting retries"
                        );
                        return Err(e);
                    }

                    let backoff = self.backoff_duration(attempt);

                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying after error"
                    );

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn timeout_error() -> Error {
        Error::RequestTimeout {
            endpoint: "/get".into(),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_backoff_duration() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: false,
            ..Default::default()
        };

        assert_eq!(policy.backoff_duration(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_duration(6), Duration::from_secs(60)); // Capped
    }

    #[test]
    fn test_backoff_with_jitter() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            ..Default::default()
        };

        let backoff = policy.backoff_duration(0);
        assert!(backoff >= Duration::from_secs(1));
        assert!(backoff <= Duration::from_millis(1250));
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let attempts = AtomicU32::new(0);

        let result = RetryPolicy::quick()
            .run("test", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(timeout_error())
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_timing_out_makes_three_attempts_with_growing_delays() {
        let started = Mutex::new(Vec::new());

        let result: Result<()> = RetryPolicy::default()
            .run("test", || {
                started.lock().unwrap().push(tokio::time::Instant::now());
                async { Err(timeout_error()) }
            })
            .await;

        assert!(matches!(result, Err(Error::RequestTimeout { .. })));

        let started = started.into_inner().unwrap();
        assert_eq!(started.len(), 3);
        let first_gap = started[1] - started[0];
        let second_gap = started[2] - started[1];
        assert!(first_gap > Duration::ZERO);
        assert!(second_gap > first_gap);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::quick()
            .run("test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(Error::UnsupportedService {
                        service: "gmail".into(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            retry_on: |_| false,
            ..RetryPolicy::quick()
        };

        let result: Result<()> = policy
            .run("test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(timeout_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
