// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Generic retry mechanism for network operations.
//!
//! Each execution walks an explicit state machine: an operation is `Attempting`, a failed
//! attempt classified as transient becomes `Retryable` (which waits out any server-requested
//! cooldown plus the backoff delay), and everything else ends as `Fatal`. Exhausting the attempt
//! budget also ends as `Fatal`, surfacing the last error.

use std::{fmt::Display, future::Future, marker::PhantomData, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backoff::ExponentialBackoff;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between attempts in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds (jitter included).
    pub max_delay_ms: u64,
    /// Backoff multiplier factor.
    pub backoff_factor: f64,
    /// Maximum jitter in milliseconds to add to delays.
    pub jitter_ms: u64,
    /// Upper bound for a server-requested cooldown in milliseconds.
    pub max_cooldown_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 300,
            max_delay_ms: 5_000,
            backoff_factor: 2.0,
            jitter_ms: 1_000,
            max_cooldown_ms: 10_000,
        }
    }
}

/// The classification of a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// The failure is transient. An optional cooldown requested by the server is waited out
    /// before the regular backoff delay.
    Retry { cooldown: Option<Duration> },
    /// The failure is permanent and is surfaced immediately.
    Fatal,
}

impl RetryDecision {
    /// A transient failure without a server-requested cooldown.
    pub const RETRY: Self = Self::Retry { cooldown: None };
}

/// The state of a single retried execution.
#[derive(Debug)]
pub enum RetryState<E> {
    /// The next attempt is about to run.
    Attempting,
    /// The last attempt failed transiently and another attempt will follow.
    Retryable {
        error: E,
        cooldown: Option<Duration>,
    },
    /// The execution is over and the error is surfaced.
    Fatal(E),
}

impl<E> RetryState<E> {
    /// Returns the state following a failed attempt.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    #[must_use]
    pub fn after_failure(error: E, decision: RetryDecision, attempt: u32, max_attempts: u32) -> Self {
        match decision {
            RetryDecision::Retry { cooldown } if attempt < max_attempts => {
                Self::Retryable { error, cooldown }
            }
            RetryDecision::Retry { .. } | RetryDecision::Fatal => Self::Fatal(error),
        }
    }
}

/// Generic retry manager for network operations.
///
/// This is stateless and thread-safe: each execution gets its own backoff state.
#[derive(Debug)]
pub struct RetryManager<E> {
    config: RetryConfig,
    _phantom: PhantomData<E>,
}

impl<E> RetryManager<E>
where
    E: Display,
{
    /// Creates a new retry manager with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backoff parameters are invalid or `max_attempts` is zero.
    pub fn new(config: RetryConfig) -> anyhow::Result<Self> {
        if config.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        ExponentialBackoff::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_factor,
            config.jitter_ms,
        )?;

        Ok(Self {
            config,
            _phantom: PhantomData,
        })
    }

    /// Returns the configuration of this manager.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes an operation with retry logic, aborting as soon as `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the last error if the operation fails fatally or exhausts its attempts, an error
    /// from `create_error` if the backoff cannot be built, and the error from
    /// `create_cancel_error` if the token is cancelled.
    pub async fn execute_with_retry_with_cancel<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
        classify: impl Fn(&E) -> RetryDecision,
        create_error: impl Fn(String) -> E,
        cancel: &CancellationToken,
        create_cancel_error: impl Fn(String) -> E,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(self.config.initial_delay_ms),
            Duration::from_millis(self.config.max_delay_ms),
            self.config.backoff_factor,
            self.config.jitter_ms,
        )
        .map_err(|e| create_error(format!("Failed to create backoff: {e}")))?;

        let max_attempts = self.config.max_attempts.max(1);
        let max_cooldown = Duration::from_millis(self.config.max_cooldown_ms);
        let mut attempt = 0;
        let mut state = RetryState::Attempting;

        loop {
            state = match state {
                RetryState::Attempting => {
                    attempt += 1;

                    let result = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!("Operation '{operation_name}' canceled during attempt {attempt}");
                            return Err(create_cancel_error(format!(
                                "Operation '{operation_name}' canceled"
                            )));
                        }
                        result = operation() => result,
                    };

                    match result {
                        Ok(success) => {
                            if attempt > 1 {
                                debug!(
                                    "Operation '{operation_name}' succeeded after {attempt} attempts"
                                );
                            }
                            return Ok(success);
                        }
                        Err(error) => {
                            let decision = classify(&error);
                            let next =
                                RetryState::after_failure(error, decision, attempt, max_attempts);
                            if let RetryState::Fatal(ref error) = next {
                                if decision == RetryDecision::Fatal {
                                    debug!(
                                        "Operation '{operation_name}' failed with non-retryable error: {error}"
                                    );
                                } else {
                                    warn!(
                                        "Operation '{operation_name}' failed after {attempt} attempts: {error}"
                                    );
                                }
                            }
                            next
                        }
                    }
                }
                RetryState::Retryable { error, cooldown } => {
                    if let Some(cooldown) = cooldown {
                        let cooldown = cooldown.min(max_cooldown);
                        warn!(
                            "Operation '{operation_name}' asked to cool down for {cooldown:?} (attempt {attempt}/{max_attempts}): {error}"
                        );
                        if !sleep_or_cancel(cooldown, cancel).await {
                            return Err(create_cancel_error(format!(
                                "Operation '{operation_name}' canceled"
                            )));
                        }
                    }

                    let delay = backoff.next_duration();
                    debug!(
                        "Operation '{operation_name}' failed (attempt {attempt}/{max_attempts}), retrying in {delay:?}: {error}"
                    );
                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(create_cancel_error(format!(
                            "Operation '{operation_name}' canceled"
                        )));
                    }

                    RetryState::Attempting
                }
                RetryState::Fatal(error) => return Err(error),
            };
        }
    }
}

/// Sleeps for `duration`, returning `false` if `cancel` fired first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = sleep(duration) => true,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use rstest::rstest;
    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("Retryable error: {0}")]
        Retryable(String),
        #[error("Throttled")]
        Throttled(Duration),
        #[error("Non-retryable error: {0}")]
        NonRetryable(String),
        #[error("Internal error: {0}")]
        Internal(String),
        #[error("Canceled: {0}")]
        Canceled(String),
    }

    fn classify_test_error(error: &TestError) -> RetryDecision {
        match error {
            TestError::Retryable(_) => RetryDecision::RETRY,
            TestError::Throttled(cooldown) => RetryDecision::Retry {
                cooldown: Some(*cooldown),
            },
            TestError::NonRetryable(_) | TestError::Internal(_) | TestError::Canceled(_) => {
                RetryDecision::Fatal
            }
        }
    }

    async fn run<F, Fut, T>(
        manager: &RetryManager<TestError>,
        operation: F,
    ) -> Result<T, TestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TestError>>,
    {
        manager
            .execute_with_retry_with_cancel(
                "test_operation",
                operation,
                classify_test_error,
                TestError::Internal,
                &CancellationToken::new(),
                TestError::Canceled,
            )
            .await
    }

    fn fast_config() -> RetryConfig {
        RetryConfig {
            jitter_ms: 0,
            ..RetryConfig::default()
        }
    }

    #[rstest]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay_ms, 300);
        assert_eq!(config.max_delay_ms, 5_000);
        assert_eq!(config.backoff_factor, 2.0);
        assert_eq!(config.jitter_ms, 1_000);
        assert_eq!(config.max_cooldown_ms, 10_000);
    }

    #[rstest]
    fn test_new_rejects_zero_attempts() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert!(RetryManager::<TestError>::new(config).is_err());
    }

    #[rstest]
    #[case::retry_with_budget(RetryDecision::RETRY, 1, 5, true)]
    #[case::retry_last_attempt(RetryDecision::RETRY, 5, 5, false)]
    #[case::cooldown_with_budget(RetryDecision::Retry { cooldown: Some(Duration::from_secs(1)) }, 4, 5, true)]
    #[case::fatal_first_attempt(RetryDecision::Fatal, 1, 5, false)]
    fn test_after_failure_transitions(
        #[case] decision: RetryDecision,
        #[case] attempt: u32,
        #[case] max_attempts: u32,
        #[case] expect_retryable: bool,
    ) {
        let state = RetryState::after_failure("boom", decision, attempt, max_attempts);
        assert_eq!(matches!(state, RetryState::Retryable { .. }), expect_retryable);
        assert_eq!(matches!(state, RetryState::Fatal(_)), !expect_retryable);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let manager = RetryManager::new(fast_config()).unwrap();

        let result = run(&manager, || async { Ok::<i32, TestError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_single_attempt() {
        let manager = RetryManager::new(fast_config()).unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        let result = run(&manager, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, TestError>(TestError::NonRetryable("bad request".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::NonRetryable(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let manager = RetryManager::new(fast_config()).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = run(&manager, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<i32, TestError>(TestError::Retryable(format!("attempt {n}")))
            }
        })
        .await;

        match result {
            Err(TestError::Retryable(msg)) => assert_eq!(msg, "attempt 5"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        // 300 + 600 + 1200 + 2400 without jitter
        assert_eq!(start.elapsed(), Duration::from_millis(4_500));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let manager = RetryManager::new(fast_config()).unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        let result = run(&manager, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Retryable("flaky".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[rstest]
    #[case::honored(Duration::from_secs(3), Duration::from_millis(3_300))]
    #[case::capped(Duration::from_secs(60), Duration::from_millis(10_300))]
    #[case::saturated(Duration::MAX, Duration::from_millis(10_300))]
    #[tokio::test(start_paused = true)]
    async fn test_cooldown_precedes_backoff(
        #[case] cooldown: Duration,
        #[case] expected_elapsed: Duration,
    ) {
        let manager = RetryManager::new(fast_config()).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = run(&manager, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TestError::Throttled(cooldown))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(start.elapsed(), expected_elapsed);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_no_cooldown_after_last_attempt() {
        let config = RetryConfig {
            max_attempts: 1,
            ..fast_config()
        };
        let manager = RetryManager::new(config).unwrap();
        let start = Instant::now();

        let result = run(&manager, || async {
            Err::<(), TestError>(TestError::Throttled(Duration::from_secs(5)))
        })
        .await;

        assert!(matches!(result, Err(TestError::Throttled(_))));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let manager = RetryManager::new(fast_config()).unwrap();
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));

        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = manager
            .execute_with_retry_with_cancel(
                "test_cancel",
                || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<(), TestError>(TestError::Retryable("down".to_string()))
                    }
                },
                classify_test_error,
                TestError::Internal,
                &token,
                TestError::Canceled,
            )
            .await;

        assert!(matches!(result, Err(TestError::Canceled(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_prevents_attempt() {
        let manager = RetryManager::new(fast_config()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = manager
            .execute_with_retry_with_cancel(
                "test_cancel",
                || async { Ok::<(), TestError>(()) },
                classify_test_error,
                TestError::Internal,
                &token,
                TestError::Canceled,
            )
            .await;

        assert!(matches!(result, Err(TestError::Canceled(_))));
    }
}
