use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bdaybot_common::time::{Clock, SystemClock};
use bdaybot_domain::constants::{
    AUTH_REFRESH_THRESHOLD_DAYS, INITIALIZE_TIMEOUT, LINK_TOKEN_LOG_MARKER, RECONNECT_DELAY,
};
use bdaybot_domain::{
    AuthConfig, ConnectionState, Environment, LinkToken, MessagingConfig, RelayError, Result,
    SessionMaterial,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::state::{transition, Step};
use crate::auth_tracker::{AuthTracker, AuthWriteMode};
use crate::groups::GroupResolver;
use crate::ports::{BlobStore, LinkPresenter, MessagingTransport, TransportEvent};
use crate::session_store::SessionStore;

/// Outcome slot shared by every caller of one initialization attempt.
type Outcome = Option<Result<()>>;

type BoxedInit = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Connection timing and mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub environment: Environment,
    pub primary_group: Option<String>,
    pub initialize_timeout: Duration,
    pub reconnect_delay: Duration,
    pub refresh_threshold_days: i64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            environment: Environment::Interactive,
            primary_group: None,
            initialize_timeout: INITIALIZE_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
            refresh_threshold_days: AUTH_REFRESH_THRESHOLD_DAYS,
        }
    }
}

impl ConnectionSettings {
    pub fn from_config(messaging: &MessagingConfig, auth: &AuthConfig) -> Self {
        Self {
            environment: messaging.environment,
            primary_group: messaging.primary_group.clone(),
            initialize_timeout: messaging.initialize_timeout(),
            reconnect_delay: messaging.reconnect_delay(),
            refresh_threshold_days: auth.refresh_threshold_days,
        }
    }
}

/// Builder for [`ConnectionManager`].
pub struct ConnectionManagerBuilder {
    transport: Arc<dyn MessagingTransport>,
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    presenter: Option<Arc<dyn LinkPresenter>>,
    settings: ConnectionSettings,
}

impl ConnectionManagerBuilder {
    pub fn new(transport: Arc<dyn MessagingTransport>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            transport,
            store,
            clock: Arc::new(SystemClock),
            presenter: None,
            settings: ConnectionSettings::default(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn LinkPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn settings(mut self, settings: ConnectionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> ConnectionManager {
        let auth = AuthTracker::new(
            Arc::clone(&self.store),
            self.clock,
            AuthWriteMode::for_environment(self.settings.environment),
        )
        .with_threshold_days(self.settings.refresh_threshold_days);
        let resolver =
            GroupResolver::new(Arc::clone(&self.transport), self.settings.primary_group.clone());
        let (state, _) = watch::channel(ConnectionState::Idle);

        ConnectionManager {
            shared: Arc::new(Shared {
                transport: self.transport,
                sessions: SessionStore::new(self.store),
                auth: Arc::new(auth),
                resolver: Arc::new(resolver),
                presenter: self.presenter,
                settings: self.settings,
                state,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }
}

struct Shared {
    transport: Arc<dyn MessagingTransport>,
    sessions: SessionStore,
    auth: Arc<AuthTracker>,
    resolver: Arc<GroupResolver>,
    presenter: Option<Arc<dyn LinkPresenter>>,
    settings: ConnectionSettings,
    state: watch::Sender<ConnectionState>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    session: SessionMaterial,
    /// Set once the durable copy has been read (or replaced) in this process.
    session_loaded: bool,
    in_flight: Option<watch::Receiver<Outcome>>,
    pump: Option<JoinHandle<()>>,
    /// Bumped on every connect so events from older connections are dropped.
    generation: u64,
}

/// Handle to the single messaging connection.
///
/// Clones share the same connection. At most one initialization attempt runs
/// at a time; concurrent `initialize` calls wait on that attempt and receive
/// its result.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn builder(
        transport: Arc<dyn MessagingTransport>,
        store: Arc<dyn BlobStore>,
    ) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new(transport, store)
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn resolver(&self) -> &Arc<GroupResolver> {
        &self.shared.resolver
    }

    pub fn auth_tracker(&self) -> &Arc<AuthTracker> {
        &self.shared.auth
    }

    pub fn transport(&self) -> &Arc<dyn MessagingTransport> {
        &self.shared.transport
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.shared.settings
    }

    /// Connect and wait until the session is ready.
    ///
    /// Returns immediately when already ready. Fails with
    /// `AuthenticationRequired` in ephemeral mode when the device must be
    /// linked, and with `Timeout` once the initialize timeout elapses.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let outcome = {
            let mut inner = self.shared.inner.lock();
            match &inner.in_flight {
                Some(outcome) => {
                    debug!("connection.initialize.joined");
                    outcome.clone()
                }
                None if self.is_ready() => return Ok(()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inner.in_flight = Some(rx.clone());
                    tokio::spawn(self.clone().run_attempt(tx));
                    rx
                }
            }
        };

        Self::await_outcome(outcome).await
    }

    /// Persist state and release the connection.
    ///
    /// Flushes a pending auth record, writes the session material and ends the
    /// transport. Failures are logged, never returned.
    pub async fn destroy(&self) {
        let (pump, snapshot) = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            let pump = inner.pump.take();
            let snapshot = inner.session_loaded.then(|| inner.session.clone());
            (pump, snapshot)
        };
        if let Some(pump) = pump {
            pump.abort();
        }

        self.shared.auth.flush().await;
        if let Some(material) = snapshot {
            self.persist_session(&material).await;
        }
        self.end_transport().await;
        self.set_state(ConnectionState::Closed);
        info!("connection.destroyed");
    }

    async fn await_outcome(mut outcome: watch::Receiver<Outcome>) -> Result<()> {
        loop {
            let current = outcome.borrow_and_update().clone();
            if let Some(result) = current {
                return result;
            }
            if outcome.changed().await.is_err() {
                let last = outcome.borrow().clone();
                return last.unwrap_or_else(|| {
                    Err(RelayError::Internal("connection attempt ended without an outcome".into()))
                });
            }
        }
    }

    async fn run_attempt(self, outcome: watch::Sender<Outcome>) {
        let timeout = self.shared.settings.initialize_timeout;
        info!(environment = %self.shared.settings.environment, "connection.initialize.start");

        let result = match tokio::time::timeout(timeout, self.connect_until_ready()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(seconds = timeout.as_secs(), "connection.initialize.timeout");
                self.end_transport().await;
                self.set_state(ConnectionState::Closed);
                Err(RelayError::Timeout {
                    operation: "initialize".into(),
                    seconds: timeout.as_secs(),
                })
            }
        };

        match &result {
            Ok(()) => info!("connection.initialize.complete"),
            Err(err) => warn!(error = %err, kind = err.kind(), "connection.initialize.failed"),
        }

        self.shared.inner.lock().in_flight = None;
        outcome.send_replace(Some(result));
    }

    async fn connect_until_ready(&self) -> Result<()> {
        if self.shared.resolver.primary_name().is_none() {
            return Err(RelayError::Configuration("primary group name is not configured".into()));
        }

        let environment = self.shared.settings.environment;
        self.set_state(ConnectionState::Initializing);
        self.load_session().await;
        let mut link_seen = false;

        loop {
            let (mut events, generation) = self.open_connection().await?;

            let restart = loop {
                let Some(event) = events.recv().await else {
                    self.set_state(ConnectionState::Closed);
                    return Err(RelayError::TransientConnection(
                        "transport event stream ended before the connection was ready".into(),
                    ));
                };

                match transition(self.state(), environment, event) {
                    None => {}
                    Some(Step::StoreCredentials(update)) => self.store_credentials(update).await,
                    Some(Step::PresentLink(token)) => {
                        link_seen = true;
                        self.set_state(ConnectionState::AwaitingLink);
                        self.present_link(&token);
                    }
                    Some(Step::RequireAuthentication(token)) => {
                        return Err(self.require_authentication(token).await);
                    }
                    Some(Step::MarkReady) => break None,
                    Some(Step::Restart { clear_session }) => break Some(clear_session),
                    Some(Step::MarkClosed(reason)) => {
                        self.set_state(ConnectionState::Closed);
                        return Err(RelayError::TransientConnection(format!(
                            "connection closed while connecting: {}",
                            reason.label()
                        )));
                    }
                }
            };

            let Some(clear_session) = restart else {
                return self.on_open(events, generation, link_seen).await;
            };

            warn!(clear_session, generation, "connection.initialize.reconnecting");
            if clear_session {
                self.clear_session().await;
            }
            tokio::time::sleep(self.shared.settings.reconnect_delay).await;
            self.set_state(ConnectionState::Initializing);
        }
    }

    async fn open_connection(&self) -> Result<(mpsc::Receiver<TransportEvent>, u64)> {
        let (session, generation) = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            let session = (!inner.session.is_empty()).then(|| inner.session.clone());
            (session, inner.generation)
        };

        debug!(generation, has_session = session.is_some(), "connection.connect");
        match self.shared.transport.connect(session).await {
            Ok(events) => Ok((events, generation)),
            Err(err) => {
                self.set_state(ConnectionState::Closed);
                Err(err)
            }
        }
    }

    async fn on_open(
        &self,
        events: mpsc::Receiver<TransportEvent>,
        generation: u64,
        link_seen: bool,
    ) -> Result<()> {
        // An unreadable record is left alone: overwriting it would hide the
        // real age of the link.
        let first_auth = matches!(self.shared.auth.last_authenticated().await, Ok(None));
        if link_seen || first_auth {
            self.shared.auth.record_authentication().await;
        }

        self.set_state(ConnectionState::Ready);
        info!(generation, "connection.ready");

        let pump = tokio::spawn(self.clone().pump(events, generation));
        let previous = self.shared.inner.lock().pump.replace(pump);
        if let Some(previous) = previous {
            previous.abort();
        }

        self.shared.resolver.resolve_primary().await.map(|_| ())
    }

    /// Apply events for a ready connection until it closes.
    async fn pump(self, mut events: mpsc::Receiver<TransportEvent>, generation: u64) {
        let environment = self.shared.settings.environment;

        while let Some(event) = events.recv().await {
            if !self.is_current(generation) {
                debug!(generation, "connection.pump.stale");
                return;
            }

            match transition(self.state(), environment, event) {
                None => {}
                Some(Step::StoreCredentials(update)) => self.store_credentials(update).await,
                Some(Step::Restart { clear_session }) => {
                    warn!(clear_session, generation, "connection.disconnected.restarting");
                    self.set_state(ConnectionState::Closed);
                    if clear_session {
                        self.clear_session().await;
                    }
                    tokio::time::sleep(self.shared.settings.reconnect_delay).await;
                    if let Err(err) = self.initialize_boxed().await {
                        warn!(error = %err, kind = err.kind(), "connection.restart.failed");
                    }
                    return;
                }
                Some(Step::MarkClosed(reason)) => {
                    self.set_state(ConnectionState::Closed);
                    warn!(reason = reason.label(), generation, "connection.closed");
                    return;
                }
                Some(step) => debug!(?step, "connection.pump.ignored"),
            }
        }

        if self.is_current(generation) && self.is_ready() {
            self.set_state(ConnectionState::Closed);
            info!(generation, "connection.stream.ended");
        }
    }

    // Boxed so the pump's future type does not contain the attempt that
    // spawns it.
    fn initialize_boxed(&self) -> BoxedInit {
        let manager = self.clone();
        Box::pin(async move { manager.initialize().await })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.inner.lock().generation == generation
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.shared.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection.state");
        }
    }

    fn write_through(&self) -> bool {
        self.shared.settings.environment == Environment::Interactive
    }

    async fn load_session(&self) {
        if self.shared.inner.lock().session_loaded {
            return;
        }

        let restored = match self.shared.sessions.restore().await {
            Ok(Some(material)) => {
                info!(files = material.len(), "connection.session.restored");
                material
            }
            Ok(None) => {
                info!("connection.session.not_found");
                SessionMaterial::new()
            }
            // Leave the durable copy alone until this process has its own
            // credentials to write.
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "connection.session.restore_failed");
                return;
            }
        };

        let mut inner = self.shared.inner.lock();
        if !inner.session_loaded {
            inner.session = restored;
            inner.session_loaded = true;
        }
    }

    async fn store_credentials(&self, update: SessionMaterial) {
        let snapshot = {
            let mut inner = self.shared.inner.lock();
            inner.session.merge(update);
            inner.session_loaded = true;
            inner.session.clone()
        };
        debug!(files = snapshot.len(), "connection.credentials.updated");
        if self.write_through() {
            self.persist_session(&snapshot).await;
        }
    }

    async fn clear_session(&self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.session.clear();
            inner.session_loaded = true;
        }
        warn!("connection.session.cleared");
        if self.write_through() {
            self.persist_session(&SessionMaterial::new()).await;
        }
    }

    async fn persist_session(&self, material: &SessionMaterial) {
        if let Err(err) = self.shared.sessions.persist(material).await {
            error!(error = %err, kind = err.kind(), "connection.session.persist_failed");
        }
    }

    fn present_link(&self, token: &LinkToken) {
        info!("connection.link.awaiting");
        match &self.shared.presenter {
            Some(presenter) => presenter.present(token),
            None => info!(link_token = %token.data, "connection.link.token"),
        }
    }

    async fn require_authentication(&self, token: LinkToken) -> RelayError {
        warn!(
            target: "bdaybot::link",
            marker = LINK_TOKEN_LOG_MARKER,
            link_token = %token.data,
            "{} device is not linked; scan this token from the phone",
            LINK_TOKEN_LOG_MARKER
        );
        self.end_transport().await;
        self.set_state(ConnectionState::Closed);
        RelayError::AuthenticationRequired { link_token: token.data }
    }

    async fn end_transport(&self) {
        if let Err(err) = self.shared.transport.end().await {
            warn!(error = %err, kind = err.kind(), "connection.end.failed");
        }
    }
}
