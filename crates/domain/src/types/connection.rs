//! Connection state and disconnect classification

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle of the single authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Initializing,
    /// A link token was issued and the device is waiting to be linked.
    AwaitingLink,
    Ready,
    Closed,
}

impl_domain_status_conversions!(ConnectionState {
    Idle => "idle",
    Initializing => "initializing",
    AwaitingLink => "awaiting_link",
    Ready => "ready",
    Closed => "closed",
});

impl ConnectionState {
    /// Whether an initialization attempt currently owns the connection.
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::Initializing | Self::AwaitingLink)
    }
}

/// Reason reported by the transport when the connection closes.
///
/// Status codes follow the linked-device protocol conventions (401 logged out,
/// 515 restart required, ...). Unrecognised codes are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The device was removed from the account on the phone.
    LoggedOut,
    /// The server rejected the stored credentials.
    AuthenticationFailed,
    /// The server asked the client to reconnect (typically right after linking).
    RestartRequired,
    ConnectionClosed,
    ConnectionLost,
    /// Another client took over the session.
    ConnectionReplaced,
    ServiceUnavailable,
    Unknown {
        status_code: Option<u16>,
        message: Option<String>,
    },
}

/// How the connection manager reacts to a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectClass {
    /// Drop local session material and relink.
    SessionInvalidated,
    /// Reconnect with the same session material.
    RestartRequired,
    /// Mark not-ready and let the next caller decide.
    Other,
}

impl DisconnectReason {
    /// Map a transport status code (and optional message) onto a reason.
    pub fn from_status(status_code: Option<u16>, message: Option<String>) -> Self {
        match status_code {
            Some(401) => Self::LoggedOut,
            Some(403) => Self::AuthenticationFailed,
            Some(515) => Self::RestartRequired,
            Some(428) => Self::ConnectionClosed,
            Some(408) => Self::ConnectionLost,
            Some(440) => Self::ConnectionReplaced,
            Some(503) => Self::ServiceUnavailable,
            _ => Self::Unknown { status_code, message },
        }
    }

    /// Classify this reason.
    ///
    /// Anything that is not explicitly invalidating or restart-required is
    /// `Other`: the session material stays intact and no restart is scheduled.
    pub fn classify(&self) -> DisconnectClass {
        match self {
            Self::LoggedOut | Self::AuthenticationFailed => DisconnectClass::SessionInvalidated,
            Self::RestartRequired => DisconnectClass::RestartRequired,
            Self::ConnectionClosed
            | Self::ConnectionLost
            | Self::ConnectionReplaced
            | Self::ServiceUnavailable
            | Self::Unknown { .. } => DisconnectClass::Other,
        }
    }

    /// Short label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::AuthenticationFailed => "authentication_failed",
            Self::RestartRequired => "restart_required",
            Self::ConnectionClosed => "connection_closed",
            Self::ConnectionLost => "connection_lost",
            Self::ConnectionReplaced => "connection_replaced",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// One-time link token (QR payload) issued by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkToken {
    /// Raw payload to encode into a scannable code.
    pub data: String,
    /// Pre-rendered terminal representation, when the transport provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascii: Option<String>,
}

impl LinkToken {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into(), ascii: None }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn logout_and_auth_failure_invalidate_the_session() {
        assert_eq!(
            DisconnectReason::from_status(Some(401), None).classify(),
            DisconnectClass::SessionInvalidated
        );
        assert_eq!(
            DisconnectReason::from_status(Some(403), None).classify(),
            DisconnectClass::SessionInvalidated
        );
    }

    #[test]
    fn restart_required_keeps_the_session() {
        let reason = DisconnectReason::from_status(Some(515), None);
        assert_eq!(reason, DisconnectReason::RestartRequired);
        assert_eq!(reason.classify(), DisconnectClass::RestartRequired);
    }

    #[test]
    fn unrecognised_codes_are_not_invalidating() {
        let reason = DisconnectReason::from_status(Some(499), Some("weird".into()));
        assert_eq!(reason.classify(), DisconnectClass::Other);
        assert_eq!(reason.label(), "unknown");

        let missing = DisconnectReason::from_status(None, None);
        assert_eq!(missing.classify(), DisconnectClass::Other);
    }

    #[test]
    fn connection_state_round_trips_through_strings() {
        assert_eq!(ConnectionState::AwaitingLink.to_string(), "awaiting_link");
        assert_eq!(ConnectionState::from_str("READY").unwrap(), ConnectionState::Ready);
        assert!(ConnectionState::Initializing.is_connecting());
        assert!(!ConnectionState::Closed.is_connecting());
    }
}
