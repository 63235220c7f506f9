use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rolesync_core::{AppError, AppResult};

/// Bounded exponential backoff policy for one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for every further retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Returns the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the wait before a 1-indexed attempt.
    ///
    /// The first attempt starts immediately; attempt `i >= 2` waits
    /// `base_delay * 2^(i - 2)`, saturating at `Duration::MAX`.
    #[must_use]
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }

        let factor = 2_u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Lifecycle of one retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Nothing attempted yet.
    Idle,
    /// Attempt in flight (1-indexed).
    Attempting {
        /// Current attempt number.
        attempt: u32,
    },
    /// Waiting before the next attempt.
    RetryWait {
        /// Attempt that follows the wait.
        attempt: u32,
        /// Backoff delay.
        delay: Duration,
    },
    /// Operation succeeded.
    Success {
        /// Attempts used.
        attempts: u32,
    },
    /// Operation failed with a non-retryable error or exhausted its retries.
    Failed {
        /// Attempts used.
        attempts: u32,
    },
    /// Cancellation token fired; the interrupted attempt is not counted.
    Cancelled {
        /// Attempts completed before cancellation.
        attempts: u32,
    },
}

impl RetryState {
    /// Returns whether no further transition can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Receives every state transition of retried operations.
pub trait RetryObserver: Send + Sync {
    /// Called after the state of `operation` changed.
    fn on_transition(&self, operation: &str, state: RetryState);
}

/// Runs remote operations under a [`RetryPolicy`] with cancellation.
#[derive(Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
    observer: Option<Arc<dyn RetryObserver>>,
}

impl Retrier {
    /// Creates a retrier for a policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: None,
        }
    }

    /// Adds a transition observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the configured policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of
    /// attempts or `cancel` fires.
    ///
    /// Cancellation is checked before each attempt and raced against both the
    /// attempt and every backoff sleep.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut attempt_operation: F,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max_attempts = self.policy.max_attempts();
        self.transition(operation, RetryState::Idle);
        let mut attempt = 1_u32;

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(operation, attempt - 1));
            }
            self.transition(operation, RetryState::Attempting { attempt });

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = attempt_operation() => Some(result),
            };

            let error = match outcome {
                None => return Err(self.cancelled(operation, attempt - 1)),
                Some(Ok(value)) => {
                    self.transition(operation, RetryState::Success { attempts: attempt });
                    return Ok(value);
                }
                Some(Err(error)) => error,
            };

            if !error.is_retryable() {
                debug!(operation, attempt, error = %error, "remote operation failed permanently");
                self.transition(operation, RetryState::Failed { attempts: attempt });
                return Err(error);
            }

            if attempt >= max_attempts {
                warn!(
                    operation,
                    attempts = attempt,
                    error = %error,
                    "remote operation exhausted retries"
                );
                self.transition(operation, RetryState::Failed { attempts: attempt });
                return Err(AppError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let next_attempt = attempt + 1;
            let delay = self.policy.delay_before_attempt(next_attempt);
            warn!(
                operation,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "remote operation failed, retrying"
            );
            self.transition(
                operation,
                RetryState::RetryWait {
                    attempt: next_attempt,
                    delay,
                },
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.cancelled(operation, attempt)),
                () = tokio::time::sleep(delay) => {}
            }
            attempt = next_attempt;
        }
    }

    fn cancelled(&self, operation: &str, attempts: u32) -> AppError {
        debug!(operation, attempts, "remote operation cancelled");
        self.transition(operation, RetryState::Cancelled { attempts });
        AppError::Cancelled(format!("{operation} was cancelled"))
    }

    fn transition(&self, operation: &str, state: RetryState) {
        if let Some(observer) = &self.observer {
            observer.on_transition(operation, state);
        }
    }
}
