//! Connection lifecycle supervision.
//!
//! The [`ConnectionSupervisor`] owns the one live transport client. It binds
//! the client's raw events, turns them into dispatcher events, and replaces
//! the client after a failure:
//!
//! ```text
//!                start()            ready
//! Disconnected ─────────▶ Connecting ─────▶ Connected
//!      ▲                   ▲     │             │
//!      │ clean close,      │     │ failure     │ failure
//!      │ login failed,     │     ▼             ▼
//!      │ stop()            └── Reconnecting ◀──┘
//!      └──────────────────────────┘
//! ```
//!
//! Reconnecting is a single fixed-backoff cycle: destroy the old client, wait,
//! create and log in a new one, then publish `Reconnected`. A failed login
//! inside the cycle leaves the supervisor Disconnected; escalating from there
//! is up to the caller.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use tether_core::{
    BoxedTransport, ClientProvider, ConnectionError, Event, EventDispatcher, RawEvent,
    TransportError, TransportFactory,
};

use crate::config::ConnectionConfig;
use crate::guard::shielded_publish;

// =============================================================================
// Settings
// =============================================================================

/// Timings and policy of a [`ConnectionSupervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Fixed wait between destroying a failed client and creating the next.
    pub backoff: Duration,
    /// Wait between the transport's ready signal and publishing `Ready`.
    pub ready_settle: Duration,
    /// Wait between a successful reconnect login and publishing `Reconnected`.
    pub reconnect_settle: Duration,
    /// Listener limit applied shortly after ready.
    pub listener_limit: usize,
    /// Wait before applying the listener limit.
    pub listener_limit_delay: Duration,
    /// Close codes treated as an intentional shutdown.
    pub clean_disconnect_codes: Vec<u16>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&ConnectionConfig::default())
    }
}

impl From<&ConnectionConfig> for SupervisorSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            backoff: Duration::from_millis(config.backoff_ms),
            ready_settle: Duration::from_millis(config.ready_settle_ms),
            reconnect_settle: Duration::from_millis(config.reconnect_settle_ms),
            listener_limit: config.listener_limit,
            listener_limit_delay: Duration::from_millis(config.listener_limit_delay_ms),
            clean_disconnect_codes: config.clean_disconnect_codes.clone(),
        }
    }
}

impl SupervisorSettings {
    /// Whether `code` closes the connection for good.
    pub fn is_clean_disconnect(&self, code: u16) -> bool {
        self.clean_disconnect_codes.contains(&code)
    }
}

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of the supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        self == next
            || matches!(
                (self, next),
                (Disconnected, Connecting)
                    | (Connecting, Connected)
                    | (Connecting, Reconnecting)
                    | (Connecting, Disconnected)
                    | (Connected, Reconnecting)
                    | (Connected, Disconnected)
                    | (Reconnecting, Connecting)
                    | (Reconnecting, Disconnected)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a transport error is treated.
///
/// Both classes currently lead to a reconnect; they differ in how loudly
/// they are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection resets and similar network flaps.
    Transient,
    /// Everything else.
    Generic,
}

impl FailureClass {
    pub fn of(err: &TransportError) -> Self {
        if err.is_transient() {
            Self::Transient
        } else {
            Self::Generic
        }
    }
}

// =============================================================================
// Supervisor
// =============================================================================

struct ActiveClient {
    transport: BoxedTransport,
    generation: u64,
    pump: JoinHandle<()>,
}

struct SupervisorInner {
    factory: Arc<dyn TransportFactory>,
    dispatcher: Arc<EventDispatcher>,
    token: String,
    settings: SupervisorSettings,
    state: watch::Sender<ConnectionState>,
    client: Mutex<Option<ActiveClient>>,
    /// Set while a reconnect cycle is in flight, cleared on the next ready.
    reconnecting: AtomicBool,
    /// Bumped for every client created.
    generation: AtomicU64,
    /// Bumped by `stop`; tasks started under an older epoch give up.
    epoch: AtomicU64,
}

/// Owns the live transport client and keeps it connected.
///
/// Cloning yields another handle to the same supervisor.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor in the `Disconnected` state.
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        dispatcher: Arc<EventDispatcher>,
        token: impl Into<String>,
        settings: SupervisorSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SupervisorInner {
                factory,
                dispatcher,
                token: token.into(),
                settings,
                state,
                client: Mutex::new(None),
                reconnecting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a client and logs in.
    ///
    /// Resolves once the login call returns; the `Ready` event follows later.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::AlreadyRunning`] unless `Disconnected`
    /// - [`ConnectionError::AuthRejected`] for bad credentials, never retried
    /// - [`ConnectionError::Login`] for any other login failure
    /// - [`ConnectionError::Stopped`] if [`stop`](Self::stop) won the race
    /// - [`ConnectionError::Closed`] if the connection closed cleanly before
    ///   login returned
    pub async fn start(&self) -> Result<(), ConnectionError> {
        let inner = &self.inner;
        if !inner.transition_from(ConnectionState::Disconnected, ConnectionState::Connecting) {
            return Err(ConnectionError::AlreadyRunning);
        }
        inner.reconnecting.store(false, Ordering::SeqCst);

        info!("Connecting");
        let epoch = inner.epoch.load(Ordering::SeqCst);
        let generation = inner.establish(epoch).await?;
        if !inner.is_current(generation) && !self.is_reconnecting() {
            debug!(generation, "Connection closed before login returned");
            return Err(ConnectionError::Closed);
        }
        Ok(())
    }

    /// Starts a reconnect cycle unless one is already in flight.
    ///
    /// Returns `true` if this call started the cycle.
    pub fn reconnect(&self) -> bool {
        self.inner.reconnect()
    }

    /// Destroys the client and goes `Disconnected` without publishing anything.
    ///
    /// A reconnect cycle in flight notices and abandons.
    pub async fn stop(&self) {
        let inner = &self.inner;
        inner.epoch.fetch_add(1, Ordering::SeqCst);

        let active = inner.client.lock().take();
        if let Some(active) = active {
            inner.dispose(active, true).await;
        }

        inner.transition(ConnectionState::Disconnected);
        inner.reconnecting.store(false, Ordering::SeqCst);
        info!("Connection stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Whether a reconnect cycle is in flight or was abandoned since the last ready.
    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::SeqCst)
    }

    /// The dispatcher events are published to.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.inner.dispatcher
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }
}

impl ClientProvider for ConnectionSupervisor {
    fn current(&self) -> Option<BoxedTransport> {
        self.inner
            .client
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.transport))
    }
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .field("reconnecting", &self.is_reconnecting())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

// =============================================================================
// Lifecycle internals
// =============================================================================

impl SupervisorInner {
    /// Moves to `next` if the lifecycle allows it. Returns whether the state
    /// is now `next`.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if *state == next {
                applied = true;
                false
            } else if state.can_transition_to(next) {
                debug!(from = %state, to = %next, "Connection state changed");
                *state = next;
                applied = true;
                true
            } else {
                warn!(from = %state, to = %next, "Refusing invalid state transition");
                false
            }
        });
        applied
    }

    /// Moves from exactly `expected` to `next`.
    fn transition_from(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state != expected {
                return false;
            }
            debug!(from = %state, to = %next, "Connection state changed");
            *state = next;
            true
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.client
            .lock()
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    fn current_transport(&self, generation: u64) -> Option<BoxedTransport> {
        self.client
            .lock()
            .as_ref()
            .filter(|active| active.generation == generation)
            .map(|active| Arc::clone(&active.transport))
    }

    /// Takes the slot if it still holds `generation`.
    fn take_generation(&self, generation: u64) -> Option<ActiveClient> {
        let mut slot = self.client.lock();
        match slot.as_ref() {
            Some(active) if active.generation == generation => slot.take(),
            _ => None,
        }
    }

    /// Destroys a client that is no longer in the slot.
    ///
    /// `abort_pump` must be `false` when called from that client's own pump.
    async fn dispose(&self, active: ActiveClient, abort_pump: bool) {
        debug!(generation = active.generation, "Destroying client");
        active.transport.destroy().await;
        if abort_pump {
            active.pump.abort();
        }
    }

    /// Creates a client, binds it and logs in. The caller has already moved
    /// the state to `Connecting`.
    async fn establish(self: &Arc<Self>, epoch: u64) -> Result<u64, ConnectionError> {
        let transport = self.factory.create();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (tx, rx) = mpsc::unbounded_channel();
        transport.bind(tx);
        let pump = tokio::spawn(pump(Arc::downgrade(self), generation, rx));

        let active = ActiveClient {
            transport: Arc::clone(&transport),
            generation,
            pump,
        };
        let (refused, replaced) = {
            let mut slot = self.client.lock();
            if self.epoch.load(Ordering::SeqCst) == epoch {
                (None, slot.replace(active))
            } else {
                (Some(active), None)
            }
        };
        if let Some(previous) = replaced {
            warn!(generation = previous.generation, "Replacing a client that was still installed");
            self.dispose(previous, true).await;
        }
        if let Some(active) = refused {
            debug!(generation, "Stopped before login");
            self.dispose(active, true).await;
            return Err(ConnectionError::Stopped);
        }

        debug!(generation, "Logging in");
        match transport.login(&self.token).await {
            Ok(()) if self.epoch.load(Ordering::SeqCst) != epoch => Err(ConnectionError::Stopped),
            Ok(()) => {
                debug!(generation, "Login accepted");
                Ok(generation)
            }
            Err(err) => {
                let err = ConnectionError::from(err);
                match &err {
                    ConnectionError::AuthRejected { reason } => {
                        error!(generation, reason = %reason, "Credentials rejected")
                    }
                    other => warn!(generation, error = %other, "Login failed"),
                }
                if let Some(active) = self.take_generation(generation) {
                    self.dispose(active, true).await;
                    self.transition(ConnectionState::Disconnected);
                }
                Err(err)
            }
        }
    }

    fn reconnect(self: &Arc<Self>) -> bool {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reconnect already in progress");
            return false;
        }

        if !self.transition(ConnectionState::Reconnecting) {
            self.reconnecting.store(false, Ordering::SeqCst);
            return false;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.reconnect_cycle(epoch).await });
        true
    }

    async fn reconnect_cycle(self: Arc<Self>, epoch: u64) {
        let previous = self.client.lock().take();
        if let Some(active) = previous {
            self.dispose(active, true).await;
        }

        info!(backoff_ms = self.settings.backoff.as_millis() as u64, "Reconnecting after backoff");
        tokio::time::sleep(self.settings.backoff).await;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Supervisor stopped during backoff, abandoning reconnect");
            return;
        }
        if !self.transition(ConnectionState::Connecting) {
            return;
        }

        match self.establish(epoch).await {
            Ok(generation) => {
                tokio::time::sleep(self.settings.reconnect_settle).await;
                if self.is_current(generation) {
                    info!(generation, "Reconnected");
                    shielded_publish(&self.dispatcher, &Event::Reconnected);
                }
            }
            Err(ConnectionError::Stopped) => {
                debug!("Supervisor stopped during reconnect");
            }
            Err(err) => {
                error!(error = %err, "Reconnect failed, staying disconnected");
            }
        }
    }

    /// Handles one raw event of the current client. Returns `false` when the
    /// pump should stop.
    async fn handle(self: &Arc<Self>, generation: u64, event: RawEvent) -> bool {
        match event {
            RawEvent::Ready => {
                if self.transition_from(ConnectionState::Connecting, ConnectionState::Connected) {
                    info!(generation, "Connected");
                    self.reconnecting.store(false, Ordering::SeqCst);
                } else if *self.state.borrow() != ConnectionState::Connected {
                    debug!(generation, "Ignoring ready of a client about to be replaced");
                    return true;
                }
                self.schedule_after_ready(generation);
            }
            RawEvent::Debug(text) => {
                shielded_publish(&self.dispatcher, &Event::Debug(text));
            }
            RawEvent::Message(message) => {
                shielded_publish(&self.dispatcher, &Event::Message(message));
            }
            RawEvent::Disconnect { code, reason } if self.settings.is_clean_disconnect(code) => {
                info!(generation, code, reason = %reason, "Connection closed cleanly");
                if let Some(active) = self.take_generation(generation) {
                    self.dispose(active, false).await;
                    self.transition(ConnectionState::Disconnected);
                }
                return false;
            }
            RawEvent::Disconnect { code, reason } => {
                warn!(generation, code, reason = %reason, "Connection lost");
                self.reconnect();
            }
            RawEvent::Error(err) => {
                match FailureClass::of(&err) {
                    FailureClass::Transient => {
                        warn!(generation, error = %err, "Transient network failure")
                    }
                    FailureClass::Generic => error!(generation, error = %err, "Transport error"),
                }
                self.reconnect();
            }
        }
        true
    }

    fn schedule_after_ready(self: &Arc<Self>, generation: u64) {
        let limit = self.settings.listener_limit;
        let limit_delay = self.settings.listener_limit_delay;
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(limit_delay).await;
            let transport = weak
                .upgrade()
                .and_then(|inner| inner.current_transport(generation));
            if let Some(transport) = transport {
                transport.raise_listener_limit(limit);
                trace!(generation, limit, "Listener limit raised");
            }
        });

        let settle = self.settings.ready_settle;
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.is_current(generation) {
                shielded_publish(&inner.dispatcher, &Event::Ready);
            }
        });
    }
}

/// Serves one client's raw events, in order, until the client is replaced.
async fn pump(
    inner: Weak<SupervisorInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<RawEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.is_current(generation) {
            trace!(generation, event = event.name(), "Dropping event of a replaced client");
            continue;
        }
        trace!(generation, event = event.name(), "Raw event");
        if !inner.handle(generation, event).await {
            break;
        }
    }
    trace!(generation, "Event pump finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tether_core::{ChatMessage, EventKind, MemoryNetwork, User};
    use tokio::time::{Instant, sleep};

    struct Harness {
        network: MemoryNetwork,
        supervisor: ConnectionSupervisor,
        ready: Arc<AtomicUsize>,
        reconnected: Arc<AtomicUsize>,
        messages: Arc<AtomicUsize>,
    }

    fn count(dispatcher: &EventDispatcher, kind: EventKind) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&counter);
        dispatcher.subscribe(
            kind,
            move |_, _| {
                clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            Vec::new(),
        );
        counter
    }

    fn harness(token: &str) -> Harness {
        let network = MemoryNetwork::new();
        let dispatcher = Arc::new(EventDispatcher::new());
        let ready = count(&dispatcher, EventKind::Ready);
        let reconnected = count(&dispatcher, EventKind::Reconnected);
        let messages = count(&dispatcher, EventKind::Message);
        let supervisor = ConnectionSupervisor::new(
            Arc::new(network.clone()),
            dispatcher,
            token,
            SupervisorSettings::default(),
        );
        Harness {
            network,
            supervisor,
            ready,
            reconnected,
            messages,
        }
    }

    async fn wait_for(supervisor: &ConnectionSupervisor, state: ConnectionState) {
        supervisor
            .watch_state()
            .wait_for(|current| *current == state)
            .await
            .unwrap();
    }

    async fn connected(h: &Harness) {
        h.supervisor.start().await.unwrap();
        wait_for(&h.supervisor, ConnectionState::Connected).await;
    }

    #[test]
    fn test_transition_table() {
        use ConnectionState::*;

        assert!(Disconnected.can_transition_to(Connecting));
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Reconnecting));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(!Reconnecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Connected));
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            FailureClass::of(&TransportError::ConnectionReset),
            FailureClass::Transient
        );
        assert_eq!(
            FailureClass::of(&TransportError::Protocol("bad frame".into())),
            FailureClass::Generic
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_publishes_ready_after_settle() {
        let h = harness("token");
        connected(&h).await;

        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(1600)).await;

        assert_eq!(h.ready.load(Ordering::SeqCst), 1);
        let client = h.network.latest().unwrap();
        assert_eq!(client.listener_limit(), 1000);
        assert!(h.supervisor.current().is_some());
        assert!(matches!(
            h.supervisor.start().await,
            Err(ConnectionError::AlreadyRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_are_republished() {
        let h = harness("token");
        connected(&h).await;

        let message = ChatMessage::new("m1", "c1", User::new("u1", "ash"), "!raid");
        h.network.latest().unwrap().emit(RawEvent::Message(message));
        sleep(Duration::from_millis(1)).await;

        assert_eq!(h.messages.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_disconnect_stops() {
        let h = harness("token");
        connected(&h).await;
        let first = h.network.latest().unwrap();

        first.emit(RawEvent::Disconnect {
            code: 1000,
            reason: "bye".into(),
        });
        wait_for(&h.supervisor, ConnectionState::Disconnected).await;
        sleep(Duration::from_secs(30)).await;

        assert!(first.is_destroyed());
        assert_eq!(h.network.client_count(), 1);
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 0);
        assert!(h.supervisor.current().is_none());
        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_reconnects_once() {
        let h = harness("token");
        connected(&h).await;
        sleep(Duration::from_secs(2)).await;
        let first = h.network.latest().unwrap();
        let started = Instant::now();

        first.emit(RawEvent::Error(TransportError::ConnectionReset));
        wait_for(&h.supervisor, ConnectionState::Reconnecting).await;
        wait_for(&h.supervisor, ConnectionState::Connected).await;

        assert!(started.elapsed() >= Duration::from_secs(6));
        assert!(first.is_destroyed());
        assert_eq!(h.network.client_count(), 2);
        let second = h.network.latest().unwrap();
        assert_eq!(second.login_count(), 1);
        assert!(!second.is_destroyed());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 1);
        assert_eq!(h.ready.load(Ordering::SeqCst), 2);
        assert!(!h.supervisor.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_failures_runs_one_cycle() {
        let h = harness("token");
        connected(&h).await;
        let first = h.network.latest().unwrap();

        first.emit(RawEvent::Disconnect {
            code: 4000,
            reason: "unknown error".into(),
        });
        first.emit(RawEvent::Error(TransportError::Network("route flap".into())));
        first.emit(RawEvent::Error(TransportError::ConnectionReset));

        wait_for(&h.supervisor, ConnectionState::Reconnecting).await;
        wait_for(&h.supervisor, ConnectionState::Connected).await;
        sleep(Duration::from_secs(30)).await;

        assert_eq!(h.network.client_count(), 2);
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_while_reconnect_pending_keeps_one_cycle() {
        let h = harness("token");
        connected(&h).await;
        let first = h.network.latest().unwrap();

        first.emit(RawEvent::Error(TransportError::ConnectionReset));
        first.emit(RawEvent::Ready);
        first.emit(RawEvent::Error(TransportError::ConnectionReset));

        wait_for(&h.supervisor, ConnectionState::Reconnecting).await;
        wait_for(&h.supervisor, ConnectionState::Connected).await;
        sleep(Duration::from_secs(30)).await;

        assert_eq!(h.network.client_count(), 2);
        let live = h
            .network
            .clients()
            .iter()
            .filter(|client| !client.is_destroyed())
            .count();
        assert_eq!(live, 1);
        assert_eq!(h.supervisor.state(), ConnectionState::Connected);
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 1);
        assert!(!h.supervisor.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_close_during_login_fails_start() {
        let h = harness("token");
        h.network.set_login_delay(Duration::from_millis(100));

        let supervisor = h.supervisor.clone();
        let start = tokio::spawn(async move { supervisor.start().await });
        sleep(Duration::from_millis(10)).await;
        h.network.latest().unwrap().emit(RawEvent::Disconnect {
            code: 1000,
            reason: String::new(),
        });

        let err = start.await.unwrap().unwrap_err();
        assert!(matches!(err, ConnectionError::Closed));
        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);
        assert!(h.supervisor.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credentials_are_fatal() {
        let h = harness("wrong");
        h.network.require_token("right");

        let err = h.supervisor.start().await.unwrap_err();

        assert!(matches!(err, ConnectionError::AuthRejected { .. }));
        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);
        assert!(h.network.latest().unwrap().is_destroyed());
        assert!(h.supervisor.current().is_none());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(h.network.client_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconnect_login_is_abandoned() {
        let h = harness("token");
        connected(&h).await;
        h.network
            .script_login(Err(TransportError::Network("still down".into())));

        h.network
            .latest()
            .unwrap()
            .emit(RawEvent::Error(TransportError::ConnectionReset));
        wait_for(&h.supervisor, ConnectionState::Reconnecting).await;
        wait_for(&h.supervisor, ConnectionState::Disconnected).await;
        sleep(Duration::from_secs(60)).await;

        assert_eq!(h.network.client_count(), 2);
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 0);
        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);

        h.supervisor.start().await.unwrap();
        wait_for(&h.supervisor, ConnectionState::Connected).await;
        assert!(!h.supervisor.is_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_publishes_nothing() {
        let h = harness("token");
        connected(&h).await;

        h.supervisor.stop().await;
        sleep(Duration::from_secs(30)).await;

        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);
        assert!(h.network.latest().unwrap().is_destroyed());
        assert_eq!(h.ready.load(Ordering::SeqCst), 0);
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff_wins() {
        let h = harness("token");
        connected(&h).await;

        h.network
            .latest()
            .unwrap()
            .emit(RawEvent::Error(TransportError::ConnectionReset));
        wait_for(&h.supervisor, ConnectionState::Reconnecting).await;
        h.supervisor.stop().await;
        sleep(Duration::from_secs(30)).await;

        assert_eq!(h.network.client_count(), 1);
        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);
        assert_eq!(h.reconnected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_refused_while_disconnected() {
        let h = harness("token");
        assert!(!h.supervisor.reconnect());
        assert!(!h.supervisor.is_reconnecting());
        assert_eq!(h.supervisor.state(), ConnectionState::Disconnected);
    }
}
