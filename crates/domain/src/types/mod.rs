//! Domain types and models

pub mod connection;
pub mod messaging;
pub mod session;

pub use connection::{ConnectionState, DisconnectClass, DisconnectReason, LinkToken};
pub use messaging::{DeliveryFailure, GroupSummary, OutboundMessage, RelaySummary, SendReceipt};
pub use session::{AuthStatus, AuthTimestampRecord, SessionMaterial};
