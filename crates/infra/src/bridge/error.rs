//! Bridge error types

use std::io;
use std::time::Duration;

use bdaybot_common::error::{ErrorClassification, ErrorSeverity};
use bdaybot_domain::RelayError;
use thiserror::Error;

use crate::errors::InfraError;

/// Failures talking to the bridge process
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bridge executable could not be started
    #[error("Failed to spawn bridge '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the bridge failed
    #[error("Bridge I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The bridge went away before answering
    #[error("Bridge process exited")]
    Exited,

    /// The bridge answered with something unexpected
    #[error("Bridge protocol violation: {0}")]
    Protocol(String),

    #[error("Failed to encode bridge command: {0}")]
    Encode(#[from] serde_json::Error),

    /// The bridge reported a failure for a command
    #[error("{message}")]
    Rejected { operation: &'static str, message: String },

    #[error("Bridge {operation} timed out after {}s", .timeout.as_secs())]
    Timeout { operation: &'static str, timeout: Duration },
}

impl ErrorClassification for BridgeError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Exited | Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Spawn { .. } => ErrorSeverity::Critical,
            Self::Io(_) | Self::Exited | Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Protocol(_) | Self::Encode(_) | Self::Rejected { .. } => ErrorSeverity::Error,
        }
    }

}

impl From<BridgeError> for InfraError {
    fn from(err: BridgeError) -> Self {
        let relay = match err {
            BridgeError::Spawn { .. } => RelayError::Configuration(err.to_string()),
            BridgeError::Io(_) | BridgeError::Exited => {
                RelayError::TransientConnection(err.to_string())
            }
            BridgeError::Protocol(_) | BridgeError::Encode(_) => {
                RelayError::Serialization(err.to_string())
            }
            // Keep the bridge's own text; retry decisions look at it.
            BridgeError::Rejected { message, .. } => RelayError::Transport(message),
            BridgeError::Timeout { operation, timeout } => RelayError::Timeout {
                operation: format!("bridge.{operation}"),
                seconds: timeout.as_secs(),
            },
        };
        InfraError(relay)
    }
}

impl From<BridgeError> for RelayError {
    fn from(err: BridgeError) -> Self {
        InfraError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_commands_keep_the_bridge_message() {
        let err = BridgeError::Rejected {
            operation: "send_text",
            message: "Protocol error (Runtime.callFunctionOn): Target closed.".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(
            RelayError::from(err),
            RelayError::Transport("Protocol error (Runtime.callFunctionOn): Target closed.".into())
        );
    }

    #[test]
    fn exited_bridge_is_transient() {
        let err = BridgeError::Exited;
        assert!(err.is_retryable());
        assert!(matches!(RelayError::from(err), RelayError::TransientConnection(_)));
    }

    #[test]
    fn spawn_failure_is_critical_misconfiguration() {
        let err = BridgeError::Spawn {
            command: "missing-bridge".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.is_critical());
        assert!(RelayError::from(err).is_misconfiguration());
    }
}
