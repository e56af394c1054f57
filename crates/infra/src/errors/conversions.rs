//! Conversions from external infrastructure errors into domain errors.

use std::io::{Error as IoError, ErrorKind};

use bdaybot_domain::RelayError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RelayError);

impl From<InfraError> for RelayError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RelayError> for InfraError {
    fn from(value: RelayError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRelayError {
    fn into_relay(self) -> RelayError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for IoError {
    fn into_relay(self) -> RelayError {
        match self.kind() {
            ErrorKind::PermissionDenied => {
                RelayError::Storage(format!("permission denied: {self}"))
            }
            ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset => {
                RelayError::TransientConnection(self.to_string())
            }
            ErrorKind::TimedOut => RelayError::TransientConnection(format!("timed out: {self}")),
            _ => RelayError::Storage(self.to_string()),
        }
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for JsonError {
    fn into_relay(self) -> RelayError {
        RelayError::Serialization(format!(
            "invalid JSON at line {} column {}: {self}",
            self.line(),
            self.column()
        ))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for HttpError {
    fn into_relay(self) -> RelayError {
        if self.is_timeout() {
            return RelayError::Storage("HTTP request timed out".into());
        }

        if self.is_connect() {
            return RelayError::Storage("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => RelayError::Configuration(format!(
                    "object store rejected credentials: {message}"
                )),
                _ => RelayError::Storage(message),
            };
        }

        RelayError::Storage(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
