//! # bdaybot Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for storage, messaging transport, link
//!   presentation and notification sources
//! - The connection manager, group resolver, message dispatcher and auth
//!   staleness tracker
//! - The relay use case tying them together
//!
//! ## Architecture Principles
//! - Only depends on `bdaybot-common` and `bdaybot-domain`
//! - No filesystem, HTTP, or process code
//! - All external dependencies via traits

pub mod auth_tracker;
pub mod connection;
pub mod dispatcher;
pub mod groups;
pub mod ports;
pub mod relay;
pub mod session_store;

// Re-export specific items to avoid ambiguity
pub use auth_tracker::{AuthTracker, AuthWriteMode};
pub use connection::{ConnectionManager, ConnectionManagerBuilder, ConnectionSettings};
pub use dispatcher::{is_transient_transport_error, MessageDispatcher};
pub use groups::GroupResolver;
pub use ports::{
    BlobStore, LinkPresenter, MessagingTransport, NotificationSource, TransportEvent,
};
pub use relay::RelayService;
pub use session_store::SessionStore;
