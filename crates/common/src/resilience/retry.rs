//! Generic retry strategy implementation
//!
//! Retries an operation that might fail transiently, with fixed or
//! exponential backoff, a pluggable retry policy and a recovery hook that runs
//! between attempts.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted; carries the final failure.
    #[error("All retry attempts exhausted after {attempts} tries: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },

    /// The recovery hook between attempts failed and asked to stop.
    #[error("Recovery between attempts failed: {source}")]
    RecoveryFailed { source: E },
}

impl<E> RetryError<E> {
    /// The operation error that ended the sequence.
    pub fn into_source(self) -> E {
        match self {
            Self::AttemptsExhausted { last_error, .. } => last_error,
            Self::NonRetryable { source } | Self::RecoveryFailed { source } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried and optionally provide a custom
    /// delay
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: initial_delay * base^attempt
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the next delay for the given attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Exponential { initial_delay, base, max_delay } => {
                let delay = initial_delay.as_millis() as f64 * base.powi(attempt as i32);
                let delay_ms = delay.min(max_delay.as_millis() as f64) as u64;
                Duration::from_millis(delay_ms)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
}

/// The main retry executor
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_recovery(operation, |_| std::future::ready(Ok(()))).await
    }

    /// Execute an operation with retry logic, running `recover` before each
    /// backoff sleep.
    ///
    /// `recover` receives the number of the attempt that just failed. An `Err`
    /// from it ends the sequence with [`RetryError::RecoveryFailed`].
    ///
    /// The policy is consulted for every failure, so a non-retryable error on
    /// the last attempt is reported as `NonRetryable` rather than exhaustion.
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_with_recovery<F, Fut, R, RFut, T, E>(
        &self,
        mut operation: F,
        mut recover: R,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(u32) -> RFut,
        RFut: Future<Output = Result<(), E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let attempt_number = attempt + 1;
            debug!("Executing operation (attempt {}/{})", attempt_number, self.config.max_attempts);

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!("Retry policy determined not to retry: {:?}", error);
                    return Err(RetryError::NonRetryable { source: error });
                }
                RetryDecision::Retry => self.config.backoff.calculate_delay(attempt),
                RetryDecision::RetryAfter(custom_delay) => custom_delay,
            };

            if attempt_number >= self.config.max_attempts {
                warn!(
                    "All retry attempts exhausted after {} tries, last error: {:?}",
                    attempt_number, error
                );
                return Err(RetryError::AttemptsExhausted {
                    attempts: attempt_number,
                    last_error: error,
                });
            }

            warn!(
                "Operation failed (attempt {}), retrying after {:?}: {:?}",
                attempt_number, delay, error
            );

            if let Err(source) = recover(attempt_number).await {
                warn!("Recovery after attempt {} failed: {:?}", attempt_number, source);
                return Err(RetryError::RecoveryFailed { source });
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
