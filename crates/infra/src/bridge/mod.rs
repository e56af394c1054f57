//! Linked-device bridge transport
//!
//! The messaging network is reached through an external bridge process that
//! owns the device session. The relay talks to it with newline-delimited JSON
//! over the process's stdio: commands go in on stdin, events and replies come
//! back on stdout.

mod error;
mod protocol;
mod transport;

pub use error::BridgeError;
pub use protocol::{BridgeCommand, BridgeEvent, Reply, Routed};
pub use transport::{BridgeTransport, DEFAULT_REQUEST_TIMEOUT};
