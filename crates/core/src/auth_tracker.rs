//! Auth staleness tracking
//!
//! Linked devices are silently logged out after a period without a fresh
//! authentication. The tracker records when the last one happened and tells
//! operators when relinking is advisable.

use std::sync::Arc;

use bdaybot_common::time::Clock;
use bdaybot_domain::constants::{AUTH_REFRESH_THRESHOLD_DAYS, AUTH_TIMESTAMP_KEY};
use bdaybot_domain::{AuthStatus, AuthTimestampRecord, Environment, RelayError, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ports::BlobStore;

/// When a recorded authentication reaches durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthWriteMode {
    /// Write as soon as it is recorded.
    Immediate,
    /// Keep it in memory until [`AuthTracker::flush`].
    Deferred,
}

impl AuthWriteMode {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Interactive => Self::Immediate,
            Environment::Ephemeral => Self::Deferred,
        }
    }
}

/// Records successful authentications and reports staleness.
pub struct AuthTracker {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    mode: AuthWriteMode,
    threshold: Duration,
    pending: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    timestamp: Option<DateTime<Utc>>,
    /// The last durable write failed; status reports a refresh until a write
    /// succeeds.
    write_failed: bool,
}

impl AuthTracker {
    pub fn new(store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>, mode: AuthWriteMode) -> Self {
        Self {
            store,
            clock,
            mode,
            threshold: Duration::days(AUTH_REFRESH_THRESHOLD_DAYS),
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn with_threshold_days(mut self, days: i64) -> Self {
        self.threshold = Duration::days(days);
        self
    }

    pub fn mode(&self) -> AuthWriteMode {
        self.mode
    }

    /// Note a successful authentication at the current time.
    ///
    /// Write failures are logged; the timestamp stays pending so a later
    /// `flush` can retry it.
    pub async fn record_authentication(&self) {
        let now = self.clock.now_utc();
        self.pending.lock().timestamp = Some(now);
        info!(timestamp = %now, mode = ?self.mode, "auth.recorded");

        if self.mode == AuthWriteMode::Immediate {
            self.flush().await;
        }
    }

    /// Write the pending timestamp, if any.
    pub async fn flush(&self) {
        let Some(timestamp) = self.pending.lock().timestamp else {
            debug!("auth.flush.nothing_pending");
            return;
        };

        match self.write(timestamp).await {
            Ok(()) => {
                let mut pending = self.pending.lock();
                // A newer record may have arrived while writing.
                if pending.timestamp == Some(timestamp) {
                    pending.timestamp = None;
                }
                pending.write_failed = false;
                debug!(timestamp = %timestamp, "auth.flush.written");
            }
            Err(err) => {
                self.pending.lock().write_failed = true;
                warn!(error = %err, kind = err.kind(), "auth.flush.failed");
            }
        }
    }

    /// Most recent authentication, preferring a not-yet-flushed record.
    ///
    /// `Ok(None)` means no authentication was ever recorded. A record that
    /// cannot be read is an error, never "absent". After a failed write only
    /// the durable record counts.
    pub async fn last_authenticated(&self) -> Result<Option<DateTime<Utc>>> {
        {
            let pending = self.pending.lock();
            if let (Some(timestamp), false) = (pending.timestamp, pending.write_failed) {
                return Ok(Some(timestamp));
            }
        }
        Ok(self.read().await?.map(|record| record.timestamp))
    }

    pub async fn is_refresh_needed(&self) -> bool {
        self.auth_status().await.refresh_needed
    }

    /// Read failures and failed writes report a refresh as needed.
    pub async fn auth_status(&self) -> AuthStatus {
        let last = match self.last_authenticated().await {
            Ok(Some(last)) => last,
            Ok(None) => return AuthStatus::unknown(),
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "auth.read.failed");
                return AuthStatus::unknown();
            }
        };
        let age = self.clock.now_utc() - last;
        let write_failed = self.pending.lock().write_failed;
        AuthStatus {
            last_authenticated: Some(last),
            days_since: Some(age.num_days()),
            refresh_needed: write_failed || age >= self.threshold,
        }
    }

    async fn read(&self) -> Result<Option<AuthTimestampRecord>> {
        let Some(bytes) = self.store.get(AUTH_TIMESTAMP_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| RelayError::Serialization(format!("corrupt auth timestamp: {err}")))
    }

    async fn write(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let bytes = serde_json::to_vec(&AuthTimestampRecord { timestamp })
            .map_err(|err| RelayError::Serialization(err.to_string()))?;
        self.store.put(AUTH_TIMESTAMP_KEY, bytes).await
    }
}
