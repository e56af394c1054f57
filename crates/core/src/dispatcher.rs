//! Message delivery with bounded retry
//!
//! A send is retried only when the failure looks like the connection dropped
//! underneath it. Between attempts the connection is re-initialized if it is
//! no longer ready, then a fixed backoff applies.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bdaybot_common::resilience::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy,
};
use bdaybot_domain::constants::{MAX_SEND_ATTEMPTS, SEND_RETRY_BACKOFF};
use bdaybot_domain::{RelayError, Result, SendReceipt};
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;

/// Error text the messaging transport produces when its connection went away
/// mid-operation.
const TRANSIENT_MARKERS: [&str; 3] = ["Protocol error", "Execution context", "Target closed"];

/// Whether `error` is worth another send attempt.
pub fn is_transient_transport_error(error: &RelayError) -> bool {
    match error {
        RelayError::NotReady | RelayError::TransientConnection(_) => true,
        RelayError::Transport(message) => {
            TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
struct TransientTransportPolicy;

impl RetryPolicy<RelayError> for TransientTransportPolicy {
    fn should_retry(&self, error: &RelayError, _attempt: u32) -> RetryDecision {
        if is_transient_transport_error(error) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Sends text messages through the managed connection.
pub struct MessageDispatcher {
    connection: ConnectionManager,
    executor: RetryExecutor<TransientTransportPolicy>,
}

impl MessageDispatcher {
    pub fn new(connection: ConnectionManager) -> Self {
        Self::with_retry(connection, MAX_SEND_ATTEMPTS, SEND_RETRY_BACKOFF)
    }

    pub fn with_retry(connection: ConnectionManager, max_attempts: u32, backoff: Duration) -> Self {
        let config = RetryConfig {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::Fixed(backoff),
        };
        Self { connection, executor: RetryExecutor::new(config, TransientTransportPolicy) }
    }

    /// Send `text` to a group given by display name or id.
    pub async fn send(&self, group: &str, text: &str) -> Result<SendReceipt> {
        let attempts = AtomicU32::new(0);
        let this = self;
        let counter = &attempts;

        let result = self
            .executor
            .execute_with_recovery(
                move || async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    this.attempt(group, text, attempt).await
                },
                move |attempt| async move { this.recover(group, attempt).await },
            )
            .await;

        match result {
            Ok(receipt) => {
                info!(
                    group,
                    message_id = %receipt.id,
                    attempts = attempts.load(Ordering::SeqCst),
                    "dispatcher.sent"
                );
                Ok(receipt)
            }
            Err(err) => {
                let err = err.into_source();
                warn!(
                    group,
                    attempts = attempts.load(Ordering::SeqCst),
                    error = %err,
                    kind = err.kind(),
                    "dispatcher.failed"
                );
                Err(err)
            }
        }
    }

    async fn attempt(&self, group: &str, text: &str, attempt: u32) -> Result<SendReceipt> {
        if !self.connection.is_ready() {
            debug!(group, attempt, "dispatcher.not_ready");
            return Err(RelayError::NotReady);
        }

        let group_id = self.connection.resolver().resolve_target(group).await?;
        let id = self.connection.transport().send_text(&group_id, text).await?;
        Ok(SendReceipt { id })
    }

    async fn recover(&self, group: &str, attempt: u32) -> Result<()> {
        info!(group, attempt, "dispatcher.retry");
        if self.connection.is_ready() {
            return Ok(());
        }

        match self.connection.initialize().await {
            Ok(()) => {
                debug!(group, attempt, "dispatcher.reinitialized");
                Ok(())
            }
            Err(err @ RelayError::AuthenticationRequired { .. }) => Err(err),
            Err(err) => {
                warn!(
                    group,
                    attempt,
                    error = %err,
                    kind = err.kind(),
                    "dispatcher.reinitialize_failed"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_markers_are_transient() {
        for message in [
            "Protocol error (Runtime.callFunctionOn): Target closed.",
            "Execution context was destroyed",
            "Target closed",
        ] {
            assert!(is_transient_transport_error(&RelayError::Transport(message.into())));
        }
        assert!(is_transient_transport_error(&RelayError::NotReady));
    }

    #[test]
    fn other_failures_are_not_retried() {
        assert!(!is_transient_transport_error(&RelayError::Transport("forbidden".into())));
        assert!(!is_transient_transport_error(&RelayError::GroupNotFound {
            name: "Family".into(),
            known_names: vec![],
        }));
        assert!(!is_transient_transport_error(&RelayError::AuthenticationRequired {
            link_token: "2@abc".into(),
        }));
    }
}
