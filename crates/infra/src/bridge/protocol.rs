//! Wire types for the bridge's JSON-lines protocol
//!
//! Every command carries a `request_id`; the bridge answers it with exactly
//! one `result`, `groups` or `error` event echoing that id. Connection
//! lifecycle events (`link`, `open`, `credentials`, `close`) are unsolicited.

use bdaybot_core::TransportEvent;
use bdaybot_domain::{DisconnectReason, GroupSummary, LinkToken, SessionMaterial};
use serde::{Deserialize, Serialize};

/// Commands sent to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Open a connection, resuming `session` when present.
    Connect {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<SessionMaterial>,
    },
    SendText {
        request_id: String,
        group_id: String,
        text: String,
    },
    ListGroups {
        request_id: String,
    },
    /// Close the current connection; the bridge process keeps running.
    End {
        request_id: String,
    },
}

impl BridgeCommand {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Connect { request_id, .. }
            | Self::SendText { request_id, .. }
            | Self::ListGroups { request_id }
            | Self::End { request_id } => request_id,
        }
    }
}

/// Events emitted by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The device must be linked by scanning `data`.
    Link {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ascii: Option<String>,
    },
    Open,
    Credentials {
        session: SessionMaterial,
    },
    Close {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// A command succeeded.
    Result {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    Groups {
        request_id: String,
        groups: Vec<GroupSummary>,
    },
    /// A command failed, or (without `request_id`) the bridge itself did.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        message: String,
    },
}

/// Answer to one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done { message_id: Option<String> },
    Groups(Vec<GroupSummary>),
    Failed(String),
}

/// Where an incoming event goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Reply { request_id: String, reply: Reply },
    Connection(TransportEvent),
    /// Bridge-level error not tied to a command.
    Fault(String),
}

impl BridgeEvent {
    pub fn route(self) -> Routed {
        match self {
            Self::Link { data, ascii } => {
                Routed::Connection(TransportEvent::LinkToken(LinkToken { data, ascii }))
            }
            Self::Open => Routed::Connection(TransportEvent::Open),
            Self::Credentials { session } => {
                Routed::Connection(TransportEvent::CredentialsUpdated(session))
            }
            Self::Close { status_code, message } => Routed::Connection(TransportEvent::Closed(
                DisconnectReason::from_status(status_code, message),
            )),
            Self::Result { request_id, message_id } => {
                Routed::Reply { request_id, reply: Reply::Done { message_id } }
            }
            Self::Groups { request_id, groups } => {
                Routed::Reply { request_id, reply: Reply::Groups(groups) }
            }
            Self::Error { request_id: Some(request_id), message } => {
                Routed::Reply { request_id, reply: Reply::Failed(message) }
            }
            Self::Error { request_id: None, message } => Routed::Fault(message),
        }
    }
}
