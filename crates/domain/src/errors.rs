//! Error types used throughout the relay

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for bdaybot
///
/// Cloneable so that every caller joined onto one in-flight connection attempt
/// receives the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum RelayError {
    /// No valid session and linking cannot proceed without an operator.
    #[error("Authentication required: scan the link code to relink the device")]
    AuthenticationRequired { link_token: String },

    /// Network or protocol hiccup that may succeed on retry.
    #[error("Transient connection error: {0}")]
    TransientConnection(String),

    /// The remote side invalidated the linked device.
    #[error("Session invalidated: {0}")]
    SessionInvalidated(String),

    #[error("Group name '{name}' is ambiguous; matching ids: {}", .ids.join(", "))]
    AmbiguousGroup { name: String, ids: Vec<String> },

    #[error("Group '{name}' not found; known groups: {}", .known_names.join(", "))]
    GroupNotFound { name: String, known_names: Vec<String> },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation '{operation}' timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Connection is not ready")]
    NotReady,

    #[error("Storage error: {0}")]
    Storage(String),

    /// Error text reported by the messaging transport.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Short stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired { .. } => "authentication_required",
            Self::TransientConnection(_) => "transient_connection",
            Self::SessionInvalidated(_) => "session_invalidated",
            Self::AmbiguousGroup { .. } => "ambiguous_group",
            Self::GroupNotFound { .. } => "group_not_found",
            Self::Configuration(_) => "configuration",
            Self::Timeout { .. } => "timeout",
            Self::NotReady => "not_ready",
            Self::Storage(_) => "storage",
            Self::Transport(_) => "transport",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Misconfiguration that no amount of retrying can fix.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousGroup { .. }
                | Self::GroupNotFound { .. }
                | Self::Configuration(_)
                | Self::AuthenticationRequired { .. }
        )
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
