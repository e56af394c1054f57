//! Connection lifecycle
//!
//! [`ConnectionManager`] owns the single authenticated session. Transport
//! events are translated by [`state::transition`] into steps that the manager
//! applies one at a time.

mod manager;
pub mod state;

pub use manager::{ConnectionManager, ConnectionManagerBuilder, ConnectionSettings};
