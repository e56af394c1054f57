//! Port interfaces for the relay
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use bdaybot_domain::{
    DisconnectReason, GroupSummary, LinkToken, OutboundMessage, Result, SessionMaterial,
};
use tokio::sync::mpsc;

/// Durable key/blob storage.
///
/// Keys are `/`-separated relative paths such as `auth_info/session.json`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob; `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a blob.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Event emitted by the messaging transport for one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The device is not linked; this token must be scanned.
    LinkToken(LinkToken),
    /// The session is authenticated and usable.
    Open,
    /// Credential files were rotated.
    CredentialsUpdated(SessionMaterial),
    /// The connection closed.
    Closed(DisconnectReason),
}

/// Linked-device messaging connection.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Open a new connection, replacing any previous one.
    ///
    /// Events for this connection arrive on the returned channel; it closes
    /// when the connection is gone.
    async fn connect(
        &self,
        session: Option<SessionMaterial>,
    ) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Send a text message and return the network's message id.
    async fn send_text(&self, group_id: &str, text: &str) -> Result<String>;

    /// List every group the linked device participates in.
    async fn list_groups(&self) -> Result<Vec<GroupSummary>>;

    /// Tear down the current connection, if any.
    async fn end(&self) -> Result<()>;
}

/// Shows a link token to an operator.
pub trait LinkPresenter: Send + Sync {
    fn present(&self, token: &LinkToken);
}

/// Supplies the notifications that are due in this run.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn pending(&self) -> Result<Vec<OutboundMessage>>;
}
