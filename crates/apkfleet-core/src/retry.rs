//! Bounded retry with a fixed inter-attempt delay.
//!
//! Failures before the last attempt are transient and followed by `delay`;
//! the failure of the last attempt is terminal. [`RetryPolicy::run_while`]
//! additionally ends the loop on errors the caller marks as not retryable.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Attempts per unit when not configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between attempts when not configured otherwise.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (0 is treated as 1).
    pub max_attempts: u32,
    /// Fixed pause after each failed, non-final attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of running an action under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T, E> {
    /// Number of attempts made (1 = no retries used).
    pub attempts: u32,
    /// The value of the successful attempt, or the last error.
    pub outcome: Result<T, E>,
}

impl<T, E> Attempted<T, E> {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no delay.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `action` until it succeeds or the attempt budget is spent.
    ///
    /// `action` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, action: F) -> Attempted<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_while(action, |_| true).await
    }

    /// Like [`run`](Self::run), but an error for which `retryable` returns
    /// `false` is returned at once.
    pub async fn run_while<T, E, F, Fut, P>(
        &self,
        mut action: F,
        retryable: P,
    ) -> Attempted<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.attempt_budget();
        let mut attempt = 1;

        loop {
            match action(attempt).await {
                Ok(value) => {
                    return Attempted {
                        attempts: attempt,
                        outcome: Ok(value),
                    }
                }
                Err(err) if attempt >= max_attempts || !retryable(&err) => {
                    return Attempted {
                        attempts: attempt,
                        outcome: Err(err),
                    }
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(self.delay).await;
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
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_does_not_sleep() {
        let start = Instant::now();
        let result: Attempted<&str, String> =
            RetryPolicy::default().run(|_| async { Ok("ok") }).await;

        assert_eq!(result.attempts, 1);
        assert_eq!(result.outcome, Ok("ok"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        let result = RetryPolicy::default()
            .run(move |attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(format!("transient failure #{attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert!(result.succeeded());
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two fixed delays, no backoff.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_last_error() {
        let start = Instant::now();
        let result: Attempted<(), String> = RetryPolicy::default()
            .run(|attempt| async move { Err(format!("failure #{attempt}")) })
            .await;

        assert_eq!(result.attempts, 3);
        assert_eq!(result.outcome, Err("failure #3".to_string()));
        // No delay after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let start = Instant::now();
        let result: Attempted<(), String> = RetryPolicy::default()
            .run_while(
                |attempt| async move { Err(format!("gone #{attempt}")) },
                |err: &String| !err.starts_with("gone"),
            )
            .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(result.outcome, Err("gone #1".to_string()));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let result: Attempted<(), &str> = RetryPolicy::new(0, Duration::from_secs(5))
            .run(|_| async { Err("nope") })
            .await;
        assert_eq!(result.attempts, 1);
        assert!(!result.succeeded());
    }
}
