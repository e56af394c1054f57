//! Shared test helpers for `bdaybot-core` integration tests.
//!
//! In-memory fakes for every port plus a builder that wires a connection
//! manager against them with a frozen clock.

#![allow(dead_code)]

pub mod store;
pub mod transport;

use std::sync::Arc;

use bdaybot_common::time::MockClock;
use bdaybot_core::{ConnectionManager, ConnectionSettings, LinkPresenter};
use bdaybot_domain::{ConnectionState, Environment, GroupSummary, LinkToken};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub use store::MemoryStore;
pub use transport::{ScriptedTransport, SendOutcome};

pub const PRIMARY: &str = "Family";

pub fn groups() -> Vec<GroupSummary> {
    vec![
        GroupSummary::new("family@g.us", "Family"),
        GroupSummary::new("work-a@g.us", "Work"),
        GroupSummary::new("work-b@g.us", "work"),
        GroupSummary::new("club@g.us", "Book Club"),
    ]
}

pub fn clock() -> MockClock {
    MockClock::at(start_time())
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-04T08:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub fn settings(environment: Environment) -> ConnectionSettings {
    ConnectionSettings {
        environment,
        primary_group: Some(PRIMARY.to_string()),
        ..ConnectionSettings::default()
    }
}

pub fn manager(
    transport: &Arc<ScriptedTransport>,
    store: &Arc<MemoryStore>,
    settings: ConnectionSettings,
) -> ConnectionManager {
    ConnectionManager::builder(transport.clone(), store.clone())
        .clock(Arc::new(clock()))
        .settings(settings)
        .build()
}

/// Wait until the manager reports `target`.
pub async fn wait_for_state(manager: &ConnectionManager, target: ConnectionState) {
    let mut states = manager.subscribe();
    states.wait_for(|state| *state == target).await.expect("state channel open");
}

/// Collects presented link tokens.
#[derive(Default)]
pub struct RecordingPresenter {
    tokens: Mutex<Vec<LinkToken>>,
}

impl RecordingPresenter {
    pub fn tokens(&self) -> Vec<LinkToken> {
        self.tokens.lock().clone()
    }
}

impl LinkPresenter for RecordingPresenter {
    fn present(&self, token: &LinkToken) {
        self.tokens.lock().push(token.clone());
    }
}
