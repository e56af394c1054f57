//! Relay use case
//!
//! One run connects, delivers every pending notification and releases the
//! connection again, whatever happened in between.

use std::sync::Arc;

use bdaybot_domain::{DeliveryFailure, RelayError, RelaySummary, Result};
use tracing::{error, info, warn};

use crate::connection::ConnectionManager;
use crate::dispatcher::MessageDispatcher;
use crate::ports::NotificationSource;

/// Delivers pending notifications through the managed connection.
pub struct RelayService {
    connection: ConnectionManager,
    dispatcher: MessageDispatcher,
    source: Arc<dyn NotificationSource>,
}

impl RelayService {
    pub fn new(
        connection: ConnectionManager,
        dispatcher: MessageDispatcher,
        source: Arc<dyn NotificationSource>,
    ) -> Self {
        Self { connection, dispatcher, source }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Execute one relay run.
    ///
    /// The connection is destroyed (session persisted, transport ended) on
    /// every path, including failures.
    pub async fn run(&self) -> Result<RelaySummary> {
        let outcome = self.deliver_pending().await;
        self.connection.destroy().await;

        match &outcome {
            Ok(summary) => info!(
                attempted = summary.attempted,
                delivered = summary.delivered.len(),
                failed = summary.failures.len(),
                "relay.run.complete"
            ),
            Err(err) => error!(error = %err, kind = err.kind(), "relay.run.failed"),
        }
        outcome
    }

    async fn deliver_pending(&self) -> Result<RelaySummary> {
        self.connection.initialize().await?;

        let messages = self.source.pending().await?;
        let mut delivered = Vec::with_capacity(messages.len());
        let mut failures = Vec::new();

        for message in &messages {
            let target = match &message.group {
                Some(group) => group.clone(),
                None => self.connection.resolver().primary_id().ok_or_else(|| {
                    RelayError::Configuration("primary group has not been resolved".into())
                })?,
            };

            match self.dispatcher.send(&target, &message.text).await {
                Ok(receipt) => delivered.push(receipt),
                // Nothing else can be delivered until someone relinks.
                Err(err @ RelayError::AuthenticationRequired { .. }) => return Err(err),
                Err(err) => {
                    warn!(group = %target, error = %err, kind = err.kind(), "relay.delivery.failed");
                    failures.push(DeliveryFailure { group: target, error: err.to_string() });
                }
            }
        }

        let auth_status = self.connection.auth_tracker().auth_status().await;
        if auth_status.refresh_needed {
            warn!(
                days_since = ?auth_status.days_since,
                "relay.auth.refresh_recommended: relink the device soon to avoid a forced logout"
            );
        }

        Ok(RelaySummary { attempted: messages.len(), delivered, failures, auth_status })
    }
}
