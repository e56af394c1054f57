//! Group and delivery types

use serde::{Deserialize, Serialize};

use super::session::AuthStatus;

/// A group the linked device participates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
}

impl GroupSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Acknowledgement for one delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
}

/// A formatted notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination group name or id; `None` targets the primary group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub text: String,
}

impl OutboundMessage {
    pub fn to_primary(text: impl Into<String>) -> Self {
        Self { group: None, text: text.into() }
    }

    pub fn to_group(group: impl Into<String>, text: impl Into<String>) -> Self {
        Self { group: Some(group.into()), text: text.into() }
    }
}

/// A message that could not be delivered during a relay run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub group: String,
    pub error: String,
}

/// Outcome of one scheduled relay run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySummary {
    pub attempted: usize,
    pub delivered: Vec<SendReceipt>,
    pub failures: Vec<DeliveryFailure>,
    pub auth_status: AuthStatus,
}

impl RelaySummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
