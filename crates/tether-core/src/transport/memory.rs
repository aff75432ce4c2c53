//! In-memory loopback transport.
//!
//! [`MemoryNetwork`] is a [`TransportFactory`] whose clients share a single
//! in-memory platform: one guild/channel cache, one log of sent messages.
//! It backs the test suites and the demo bot, and lets a caller play the
//! platform's side by injecting raw events into the live client.
//!
//! ```rust,ignore
//! let network = MemoryNetwork::new().with_guild(Guild::new("g1", "Sittard"));
//! let client = network.create();
//! client.login("token").await?;              // emits Ready by default
//! network.latest().unwrap().emit(RawEvent::Disconnect { code: 4000, reason: String::new() });
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{BoxedTransport, RawEvent, RawEventSink, Transport, TransportFactory};
use crate::error::{TransportError, TransportResult};
use crate::model::{Channel, Guild};

/// A message recorded by [`MemoryTransport::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Index of the client that sent it.
    pub client: usize,
    /// Target channel.
    pub channel_id: String,
    /// Text as sent.
    pub content: String,
}

struct StagedGuild {
    guild: Arc<Guild>,
    hidden_lookups: usize,
}

struct NetworkState {
    guilds: HashMap<String, StagedGuild>,
    channels: HashMap<String, Channel>,
    login_script: VecDeque<TransportResult<()>>,
    accepted_token: Option<String>,
    auto_ready: bool,
    login_delay: Duration,
    clients: Vec<Arc<MemoryTransport>>,
    sent: Vec<SentMessage>,
    guild_lookups: usize,
}

/// The shared in-memory platform. Cloning yields another handle to it.
#[derive(Clone)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    /// Creates an empty platform whose clients emit `Ready` after login.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState {
                guilds: HashMap::new(),
                channels: HashMap::new(),
                login_script: VecDeque::new(),
                accepted_token: None,
                auto_ready: true,
                login_delay: Duration::ZERO,
                clients: Vec::new(),
                sent: Vec::new(),
                guild_lookups: 0,
            })),
        }
    }

    /// Adds a guild (builder pattern).
    pub fn with_guild(self, guild: Guild) -> Self {
        self.insert_guild(guild);
        self
    }

    /// Adds a channel (builder pattern).
    pub fn with_channel(self, channel: Channel) -> Self {
        self.insert_channel(channel);
        self
    }

    /// Adds or replaces a guild, visible immediately.
    pub fn insert_guild(&self, guild: Guild) {
        self.stage_guild(guild, 0);
    }

    /// Adds a guild that stays invisible for the next `hidden_lookups` lookups,
    /// the way a fresh session's cache fills in after `Ready`.
    pub fn stage_guild(&self, guild: Guild, hidden_lookups: usize) {
        let staged = StagedGuild {
            guild: Arc::new(guild),
            hidden_lookups,
        };
        self.state
            .lock()
            .guilds
            .insert(staged.guild.id.clone(), staged);
    }

    /// Adds or replaces a channel.
    pub fn insert_channel(&self, channel: Channel) {
        self.state
            .lock()
            .channels
            .insert(channel.id.clone(), channel);
    }

    /// Only `token` is accepted from now on; other tokens are rejected.
    pub fn require_token(&self, token: impl Into<String>) {
        self.state.lock().accepted_token = Some(token.into());
    }

    /// Queues the outcome of the next login, ahead of the token check.
    pub fn script_login(&self, outcome: TransportResult<()>) {
        self.state.lock().login_script.push_back(outcome);
    }

    /// Whether clients emit `Ready` on successful login.
    pub fn set_auto_ready(&self, enabled: bool) {
        self.state.lock().auto_ready = enabled;
    }

    /// Makes every login take `delay` before it resolves.
    pub fn set_login_delay(&self, delay: Duration) {
        self.state.lock().login_delay = delay;
    }

    /// Every client created so far, oldest first.
    pub fn clients(&self) -> Vec<Arc<MemoryTransport>> {
        self.state.lock().clients.clone()
    }

    /// The most recently created client.
    pub fn latest(&self) -> Option<Arc<MemoryTransport>> {
        self.state.lock().clients.last().cloned()
    }

    /// Number of clients created so far.
    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    /// Total guild lookups served, hits and misses alike.
    pub fn guild_lookups(&self) -> usize {
        self.state.lock().guild_lookups
    }

    /// Messages sent by any client, in order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }
}

impl TransportFactory for MemoryNetwork {
    fn create(&self) -> BoxedTransport {
        let mut state = self.state.lock();
        let client = Arc::new(MemoryTransport {
            index: state.clients.len(),
            network: Arc::clone(&self.state),
            sink: Mutex::new(None),
            logins: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            listener_limit: AtomicUsize::new(0),
        });
        state.clients.push(Arc::clone(&client));
        debug!(client = client.index, "Memory client created");
        client
    }
}

/// A client of a [`MemoryNetwork`].
pub struct MemoryTransport {
    index: usize,
    network: Arc<Mutex<NetworkState>>,
    sink: Mutex<Option<RawEventSink>>,
    logins: AtomicUsize,
    destroyed: AtomicBool,
    listener_limit: AtomicUsize,
}

impl MemoryTransport {
    /// Creation index within the network.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pushes a raw event to whoever is bound. Returns `false` if nothing
    /// received it (not bound, receiver gone, or client destroyed).
    pub fn emit(&self, event: RawEvent) -> bool {
        if self.is_destroyed() {
            return false;
        }
        trace!(client = self.index, event = event.name(), "Emitting raw event");
        self.sink
            .lock()
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok())
    }

    /// Whether `bind` has been called and not undone by `destroy`.
    pub fn is_bound(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Number of login attempts made on this client.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Whether `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// The last limit passed to `raise_listener_limit`, `0` if never called.
    pub fn listener_limit(&self) -> usize {
        self.listener_limit.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn login(&self, token: &str) -> TransportResult<()> {
        if self.is_destroyed() {
            return Err(TransportError::Destroyed);
        }
        self.logins.fetch_add(1, Ordering::SeqCst);

        let delay = self.network.lock().login_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (outcome, auto_ready) = {
            let mut state = self.network.lock();
            let outcome = match state.login_script.pop_front() {
                Some(scripted) => scripted,
                None => match &state.accepted_token {
                    Some(accepted) if accepted != token => Err(TransportError::AuthRejected {
                        reason: "invalid token".into(),
                    }),
                    _ => Ok(()),
                },
            };
            (outcome, state.auto_ready)
        };

        debug!(client = self.index, ok = outcome.is_ok(), "Memory client login");
        if outcome.is_ok() && auto_ready {
            self.emit(RawEvent::Ready);
        }
        outcome
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.sink.lock().take();
        debug!(client = self.index, "Memory client destroyed");
    }

    fn bind(&self, sink: RawEventSink) {
        *self.sink.lock() = Some(sink);
    }

    fn guild(&self, id: &str) -> Option<Arc<Guild>> {
        if self.is_destroyed() {
            return None;
        }
        let mut state = self.network.lock();
        state.guild_lookups += 1;
        let staged = state.guilds.get_mut(id)?;
        if staged.hidden_lookups > 0 {
            staged.hidden_lookups -= 1;
            return None;
        }
        Some(Arc::clone(&staged.guild))
    }

    fn channel(&self, id: &str) -> Option<Channel> {
        if self.is_destroyed() {
            return None;
        }
        self.network.lock().channels.get(id).cloned()
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> TransportResult<()> {
        if self.is_destroyed() {
            return Err(TransportError::Destroyed);
        }
        let mut state = self.network.lock();
        if !state.channels.contains_key(channel_id) {
            return Err(TransportError::SendFailed(format!(
                "unknown channel '{channel_id}'"
            )));
        }
        state.sent.push(SentMessage {
            client: self.index,
            channel_id: channel_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    fn raise_listener_limit(&self, limit: usize) {
        self.listener_limit.store(limit, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_login_emits_ready_to_bound_sink() {
        let network = MemoryNetwork::new();
        let client = network.create();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.bind(tx);

        client.login("token").await.unwrap();

        assert!(matches!(rx.recv().await, Some(RawEvent::Ready)));
        assert_eq!(network.latest().unwrap().login_count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() {
        let network = MemoryNetwork::new();
        network.require_token("secret");
        let client = network.create();

        let err = client.login("guess").await.unwrap_err();
        assert!(matches!(err, TransportError::AuthRejected { .. }));
        assert!(client.login("secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_login_outcome_wins() {
        let network = MemoryNetwork::new();
        network.script_login(Err(TransportError::ConnectionReset));
        let client = network.create();

        assert!(matches!(
            client.login("token").await,
            Err(TransportError::ConnectionReset)
        ));
        assert!(client.login("token").await.is_ok());
    }

    #[tokio::test]
    async fn test_destroy_unbinds_and_blocks_use() {
        let network = MemoryNetwork::new().with_channel(Channel::new("c1", "general", "g1"));
        let client = network.create();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.bind(tx);

        client.destroy().await;

        let memory = network.latest().unwrap();
        assert!(memory.is_destroyed());
        assert!(!memory.emit(RawEvent::Ready));
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            client.send_message("c1", "hi").await,
            Err(TransportError::Destroyed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_delay() {
        let network = MemoryNetwork::new();
        network.set_login_delay(Duration::from_millis(100));
        let client = network.create();

        let start = tokio::time::Instant::now();
        client.login("token").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_staged_guild_appears_after_hidden_lookups() {
        let network = MemoryNetwork::new();
        network.stage_guild(Guild::new("g1", "Sittard"), 2);
        let client = network.create();

        assert!(client.guild("g1").is_none());
        assert!(client.guild("g1").is_none());
        assert!(client.guild("g1").is_some());
        assert_eq!(network.guild_lookups(), 3);
    }

    #[tokio::test]
    async fn test_send_records_message() {
        let network = MemoryNetwork::new().with_channel(Channel::new("c1", "general", "g1"));
        let client = network.create();

        client.send_message("c1", "hello").await.unwrap();
        assert!(client.send_message("nope", "hello").await.is_err());

        assert_eq!(
            network.sent_messages(),
            vec![SentMessage {
                client: 0,
                channel_id: "c1".into(),
                content: "hello".into(),
            }]
        );
    }
}
