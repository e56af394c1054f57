//! Scripted `MessagingTransport`.
//!
//! Each `connect` consumes the next script and emits its events right away;
//! the channel stays open so tests can push more events with `emit`. Without
//! a script a connection opens immediately.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bdaybot_core::{MessagingTransport, TransportEvent};
use bdaybot_domain::{DisconnectReason, GroupSummary, RelayError, Result, SessionMaterial};
use parking_lot::Mutex;
use tokio::sync::mpsc;

enum Script {
    Events(Vec<TransportEvent>),
    Fail(RelayError),
}

/// What the next `send_text` call does.
pub enum SendOutcome {
    Fail(RelayError),
    /// Drop the connection with `reason`, then fail with the error.
    FailAndClose(RelayError, DisconnectReason),
}

#[derive(Default)]
struct State {
    scripts: VecDeque<Script>,
    sender: Option<mpsc::Sender<TransportEvent>>,
    connects: Vec<Option<SessionMaterial>>,
    ends: usize,
    groups: Vec<GroupSummary>,
    list_calls: usize,
    send_outcomes: VecDeque<SendOutcome>,
    sends: Vec<(String, String)>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub fn new(groups: Vec<GroupSummary>) -> Self {
        let transport = Self::default();
        transport.state.lock().groups = groups;
        transport
    }

    /// Events for the next connection.
    pub fn script(&self, events: Vec<TransportEvent>) -> &Self {
        self.state.lock().scripts.push_back(Script::Events(events));
        self
    }

    /// Next connection attempt fails outright.
    pub fn script_failure(&self, error: RelayError) -> &Self {
        self.state.lock().scripts.push_back(Script::Fail(error));
        self
    }

    pub fn push_send(&self, outcome: SendOutcome) -> &Self {
        self.state.lock().send_outcomes.push_back(outcome);
        self
    }

    /// Push an event onto the current connection.
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self.state.lock().sender.clone().expect("no open connection");
        sender.send(event).await.expect("connection receiver dropped");
    }

    /// Poll until at least `count` connects happened.
    pub async fn wait_for_connects(&self, count: usize) {
        while self.connect_count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects.len()
    }

    pub fn connects(&self) -> Vec<Option<SessionMaterial>> {
        self.state.lock().connects.clone()
    }

    pub fn end_count(&self) -> usize {
        self.state.lock().ends
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn sends(&self) -> Vec<(String, String)> {
        self.state.lock().sends.clone()
    }
}

#[async_trait]
impl MessagingTransport for ScriptedTransport {
    async fn connect(
        &self,
        session: Option<SessionMaterial>,
    ) -> Result<mpsc::Receiver<TransportEvent>> {
        let mut state = self.state.lock();
        state.connects.push(session);

        let events = match state.scripts.pop_front() {
            Some(Script::Fail(error)) => return Err(error),
            Some(Script::Events(events)) => events,
            None => vec![TransportEvent::Open],
        };

        let (tx, rx) = mpsc::channel(32);
        for event in events {
            tx.try_send(event).expect("script fits in channel");
        }
        state.sender = Some(tx);
        Ok(rx)
    }

    async fn send_text(&self, group_id: &str, text: &str) -> Result<String> {
        let (outcome, sender, number) = {
            let mut state = self.state.lock();
            state.sends.push((group_id.to_string(), text.to_string()));
            (state.send_outcomes.pop_front(), state.sender.clone(), state.sends.len())
        };

        match outcome {
            None => Ok(format!("msg-{number}")),
            Some(SendOutcome::Fail(error)) => Err(error),
            Some(SendOutcome::FailAndClose(error, reason)) => {
                if let Some(sender) = sender {
                    let _ = sender.send(TransportEvent::Closed(reason)).await;
                }
                // Let the connection observe the close before the error lands.
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                Err(error)
            }
        }
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        Ok(state.groups.clone())
    }

    async fn end(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ends += 1;
        state.sender = None;
        Ok(())
    }
}
