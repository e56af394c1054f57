//! Relay constants
//!
//! Centralized location for the timing and storage-layout constants shared by
//! the connection core and its adapters.

use std::time::Duration;

// Connection lifecycle
pub const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(180);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// Message delivery
pub const MAX_SEND_ATTEMPTS: u32 = 3;
pub const SEND_RETRY_BACKOFF: Duration = Duration::from_secs(3);

// Auth staleness
pub const AUTH_REFRESH_THRESHOLD_DAYS: i64 = 7;

// Durable storage layout
pub const SESSION_BUNDLE_KEY: &str = "auth_info/session.json";
pub const AUTH_TIMESTAMP_KEY: &str = "auth_state/last_auth.json";

/// Marker on the log line that carries a link token in non-interactive runs.
pub const LINK_TOKEN_LOG_MARKER: &str = "LINK_TOKEN_REQUIRED";
