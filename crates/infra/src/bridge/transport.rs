use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bdaybot_common::error::ErrorClassification;
use bdaybot_core::{MessagingTransport, TransportEvent};
use bdaybot_domain::{
    BridgeConfig, DisconnectReason, GroupSummary, RelayError, Result, SessionMaterial,
};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::BridgeError;
use super::protocol::{BridgeCommand, BridgeEvent, Reply, Routed};

/// How long a single command may wait for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_BUFFER: usize = 64;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

enum Launcher {
    /// Spawn (and respawn) the configured command on demand.
    Command(BridgeConfig),
    /// Streams handed in by the caller; cannot be re-established.
    Attached,
}

/// State shared with the stdout reader task.
#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<String, oneshot::Sender<Reply>>>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl Shared {
    async fn dispatch(&self, event: BridgeEvent) {
        match event.route() {
            Routed::Reply { request_id, reply } => {
                let waiter = self.pending.lock().remove(&request_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(reply);
                    }
                    None => debug!(request_id, "bridge.reply.unmatched"),
                }
            }
            Routed::Connection(event) => {
                let sender = self.events.lock().clone();
                match sender {
                    Some(sender) => {
                        if sender.send(event).await.is_err() {
                            debug!("bridge.events.receiver_dropped");
                        }
                    }
                    None => debug!(?event, "bridge.event.no_connection"),
                }
            }
            Routed::Fault(message) => warn!(message, "bridge.fault"),
        }
    }

    /// The bridge stream is gone: close the connection and fail every waiter.
    async fn disconnect(&self) {
        let sender = self.events.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(TransportEvent::Closed(DisconnectReason::ConnectionLost)).await;
        }
        self.pending.lock().clear();
    }
}

struct Link {
    writer: Writer,
    reader: JoinHandle<()>,
    // Held for kill-on-drop.
    _child: Option<Child>,
}

impl Link {
    fn start<R>(reader: R, writer: Writer, child: Option<Child>, shared: Arc<Shared>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let reader = tokio::spawn(read_events(reader, shared));
        Self { writer, reader, _child: child }
    }

    fn is_alive(&self) -> bool {
        !self.reader.is_finished()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_events<R>(reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<BridgeEvent>(&line) {
                    Ok(event) => shared.dispatch(event).await,
                    Err(err) => warn!(error = %err, line = %line, "bridge.event.unparseable"),
                }
            }
            Ok(None) => {
                debug!("bridge.stdout.closed");
                break;
            }
            Err(err) => {
                error!(error = %err, "bridge.stdout.read_failed");
                break;
            }
        }
    }
    shared.disconnect().await;
}

/// [`MessagingTransport`] backed by a bridge process.
///
/// One bridge serves every connection of this transport. A command that gets
/// no reply within the request timeout fails with a timeout; when the bridge
/// exits, the open connection reports `ConnectionLost` and the next `connect`
/// starts a fresh process.
pub struct BridgeTransport {
    launcher: Launcher,
    request_timeout: Duration,
    shared: Arc<Shared>,
    link: tokio::sync::Mutex<Option<Link>>,
    next_request: AtomicU64,
}

impl BridgeTransport {
    /// Transport that spawns `config.command` on first use.
    pub fn spawn(config: BridgeConfig) -> Self {
        Self::with_launcher(Launcher::Command(config), Arc::new(Shared::default()), None)
    }

    /// Transport over an already running bridge.
    ///
    /// Must be called inside a Tokio runtime; the reader task starts here.
    pub fn attach<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared::default());
        let link = Link::start(reader, Box::new(writer), None, Arc::clone(&shared));
        Self::with_launcher(Launcher::Attached, shared, Some(link))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn with_launcher(launcher: Launcher, shared: Arc<Shared>, link: Option<Link>) -> Self {
        Self {
            launcher,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shared,
            link: tokio::sync::Mutex::new(link),
            next_request: AtomicU64::new(1),
        }
    }

    fn spawn_process(&self, config: &BridgeConfig) -> std::result::Result<Link, BridgeError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn { command: config.command.clone(), source })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Protocol("bridge stdin is not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Protocol("bridge stdout is not piped".into()))?;

        info!(command = %config.command, pid = ?child.id(), "bridge.spawned");
        Ok(Link::start(stdout, Box::new(stdin), Some(child), Arc::clone(&self.shared)))
    }

    async fn write(&self, command: &BridgeCommand) -> std::result::Result<(), BridgeError> {
        let mut line = serde_json::to_string(command)?;
        line.push('\n');

        let mut slot = self.link.lock().await;
        if !slot.as_ref().is_some_and(Link::is_alive) {
            match &self.launcher {
                Launcher::Command(config) => {
                    if slot.is_some() {
                        warn!("bridge.respawning");
                    }
                    *slot = Some(self.spawn_process(config)?);
                }
                Launcher::Attached => return Err(BridgeError::Exited),
            }
        }
        let link = slot.as_mut().ok_or(BridgeError::Exited)?;

        link.writer.write_all(line.as_bytes()).await?;
        link.writer.flush().await?;
        Ok(())
    }

    async fn request<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> std::result::Result<Reply, BridgeError>
    where
        F: FnOnce(String) -> BridgeCommand,
    {
        let result = self.exchange(operation, build).await;
        if let Err(err) = &result {
            let severity = err.severity();
            let retryable = err.is_retryable();
            if err.is_critical() {
                error!(operation, error = %err, %severity, retryable, "bridge.request.failed");
            } else {
                warn!(operation, error = %err, %severity, retryable, "bridge.request.failed");
            }
        }
        result
    }

    async fn exchange<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> std::result::Result<Reply, BridgeError>
    where
        F: FnOnce(String) -> BridgeCommand,
    {
        let request_id = format!("req-{}", self.next_request.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(request_id.clone(), tx);

        let command = build(request_id.clone());
        debug!(operation, request_id, "bridge.request");
        if let Err(err) = self.write(&command).await {
            self.shared.pending.lock().remove(&request_id);
            return Err(err);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Reply::Failed(message))) => Err(BridgeError::Rejected { operation, message }),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BridgeError::Exited),
            Err(_) => {
                self.shared.pending.lock().remove(&request_id);
                Err(BridgeError::Timeout { operation, timeout: self.request_timeout })
            }
        }
    }
}

#[async_trait]
impl MessagingTransport for BridgeTransport {
    async fn connect(
        &self,
        session: Option<SessionMaterial>,
    ) -> Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        // Replacing the sender closes the previous connection's stream.
        *self.shared.events.lock() = Some(tx);

        let resumed = session.is_some();
        let accepted = self
            .request("connect", |request_id| BridgeCommand::Connect { request_id, session })
            .await;

        match accepted {
            Ok(_) => {
                debug!(resumed, "bridge.connect.accepted");
                Ok(rx)
            }
            Err(err) => {
                self.shared.events.lock().take();
                Err(err.into())
            }
        }
    }

    async fn send_text(&self, group_id: &str, text: &str) -> Result<String> {
        let reply = self
            .request("send_text", |request_id| BridgeCommand::SendText {
                request_id,
                group_id: group_id.to_string(),
                text: text.to_string(),
            })
            .await?;

        match reply {
            Reply::Done { message_id: Some(id) } => Ok(id),
            other => Err(BridgeError::Protocol(format!("send_text answered with {other:?}")).into()),
        }
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        let reply = self
            .request("list_groups", |request_id| BridgeCommand::ListGroups { request_id })
            .await?;

        match reply {
            Reply::Groups(groups) => Ok(groups),
            other => {
                Err(BridgeError::Protocol(format!("list_groups answered with {other:?}")).into())
            }
        }
    }

    async fn end(&self) -> Result<()> {
        let had_connection = self.shared.events.lock().take().is_some();
        let alive = self.link.lock().await.as_ref().is_some_and(Link::is_alive);
        if !had_connection || !alive {
            return Ok(());
        }

        match self.request("end", |request_id| BridgeCommand::End { request_id }).await {
            Ok(_) => Ok(()),
            Err(BridgeError::Exited) => Ok(()),
            Err(err) => Err(RelayError::from(err)),
        }
    }
}
