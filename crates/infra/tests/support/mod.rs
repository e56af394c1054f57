//! Shared helpers for `bdaybot-infra` integration tests.
//!
//! A scripted bridge speaking the JSON-lines protocol over an in-process
//! duplex pipe, so adapters can be exercised without a real bridge binary.

#![allow(dead_code)]

use std::time::Duration;

use bdaybot_domain::GroupSummary;
use bdaybot_infra::bridge::{BridgeCommand, BridgeEvent};
use bdaybot_infra::BridgeTransport;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

/// Commands the fake bridge has received, in order.
pub struct Seen(mpsc::UnboundedReceiver<BridgeCommand>);

impl Seen {
    /// Collect commands until one matches `stop` (inclusive).
    pub async fn until<F>(&mut self, stop: F) -> Vec<BridgeCommand>
    where
        F: Fn(&BridgeCommand) -> bool,
    {
        let mut commands = Vec::new();
        let collect = async {
            while let Some(command) = self.0.recv().await {
                let done = stop(&command);
                commands.push(command);
                if done {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect).await.expect("bridge command");
        commands
    }
}

pub fn groups() -> Vec<GroupSummary> {
    vec![
        GroupSummary::new("family@g.us", "Family"),
        GroupSummary::new("club@g.us", "Book Club"),
    ]
}

/// Attach a transport to a bridge that answers via `respond`.
pub fn fake_bridge<F>(respond: F) -> (BridgeTransport, Seen)
where
    F: Fn(&BridgeCommand) -> Vec<BridgeEvent> + Send + 'static,
{
    let (client, bridge) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (bridge_read, bridge_write) = tokio::io::split(bridge);
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(serve(bridge_read, bridge_write, respond, seen_tx));
    (BridgeTransport::attach(client_read, client_write), Seen(seen_rx))
}

async fn serve<F>(
    reader: ReadHalf<DuplexStream>,
    mut writer: WriteHalf<DuplexStream>,
    respond: F,
    seen: mpsc::UnboundedSender<BridgeCommand>,
) where
    F: Fn(&BridgeCommand) -> Vec<BridgeEvent>,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command: BridgeCommand = serde_json::from_str(&line).expect("valid command");
        for event in respond(&command) {
            let mut out = serde_json::to_string(&event).expect("serializable event");
            out.push('\n');
            writer.write_all(out.as_bytes()).await.expect("write event");
        }
        let _ = seen.send(command);
    }
}

/// Plain success reply for `command`.
pub fn ok(command: &BridgeCommand) -> BridgeEvent {
    BridgeEvent::Result { request_id: command.request_id().to_string(), message_id: None }
}

/// A bridge with a linked account: connects straight to `open` and accepts
/// every message.
pub fn linked_bridge(command: &BridgeCommand) -> Vec<BridgeEvent> {
    match command {
        BridgeCommand::Connect { .. } => vec![ok(command), BridgeEvent::Open],
        BridgeCommand::ListGroups { request_id } => {
            vec![BridgeEvent::Groups { request_id: request_id.clone(), groups: groups() }]
        }
        BridgeCommand::SendText { request_id, group_id, .. } => vec![BridgeEvent::Result {
            request_id: request_id.clone(),
            message_id: Some(format!("sent-to-{group_id}")),
        }],
        BridgeCommand::End { .. } => vec![ok(command)],
    }
}
