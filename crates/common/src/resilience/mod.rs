//! Resilience patterns for fault tolerance
//!
//! Generic retry with pluggable backoff and retry policies. The
//! executor also accepts a recovery hook that runs between attempts, which is
//! how callers re-establish a dropped connection before trying again.

pub mod retry;

// Re-export retry types
pub use retry::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy,
    RetryResult,
};
