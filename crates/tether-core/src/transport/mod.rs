//! Transport client boundary.
//!
//! The platform client (gateway connection, REST calls, local cache) sits
//! behind [`Transport`]. tether never speaks the wire protocol itself; it only
//! drives a client's lifecycle, listens to its [`RawEvent`]s and reads its
//! cache.
//!
//! ```text
//! ┌──────────────────┐  create   ┌────────────────────┐
//! │ TransportFactory │──────────▶│ Transport (client) │
//! └──────────────────┘           └─────────┬──────────┘
//!                                          │ RawEvent
//!                                          ▼
//!                                ┌────────────────────┐   Event   ┌─────────────────┐
//!                                │     supervisor     │──────────▶│ EventDispatcher │
//!                                └────────────────────┘           └─────────────────┘
//! ```

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::model::{Channel, ChatMessage, Guild};

/// A raw lifecycle or data callback from the transport client.
#[derive(Debug, Clone)]
pub enum RawEvent {
    /// Login finished and the session is live.
    Ready,
    /// Diagnostic output.
    Debug(String),
    /// An incoming chat message.
    Message(ChatMessage),
    /// The connection closed.
    Disconnect {
        /// Close code reported by the platform.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// The client hit an error.
    Error(TransportError),
}

impl RawEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Debug(_) => "debug",
            Self::Message(_) => "message",
            Self::Disconnect { .. } => "disconnect",
            Self::Error(_) => "error",
        }
    }
}

/// Channel end a client pushes its [`RawEvent`]s into.
pub type RawEventSink = mpsc::UnboundedSender<RawEvent>;

/// A platform client instance.
///
/// An instance is single-use: once [`destroy`](Transport::destroy) has been
/// called it is discarded and a fresh one is created by the
/// [`TransportFactory`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Logs in with the bot token.
    ///
    /// Rejected credentials must be reported as [`TransportError::AuthRejected`].
    async fn login(&self, token: &str) -> TransportResult<()>;

    /// Tears the client down. Resolves once teardown is complete.
    async fn destroy(&self);

    /// Routes this client's raw events into `sink`, replacing any earlier sink.
    fn bind(&self, sink: RawEventSink);

    /// Looks up a guild in the local cache.
    fn guild(&self, id: &str) -> Option<Arc<Guild>>;

    /// Looks up a channel in the local cache.
    fn channel(&self, id: &str) -> Option<Channel>;

    /// Posts a text message to a channel.
    async fn send_message(&self, channel_id: &str, content: &str) -> TransportResult<()>;

    /// Raises the client's internal listener limit.
    ///
    /// Called once shortly after `Ready`. Clients without such a limit keep
    /// the default no-op.
    fn raise_listener_limit(&self, _limit: usize) {}
}

/// Shared handle to a transport client.
pub type BoxedTransport = Arc<dyn Transport>;

/// Creates fresh transport clients.
pub trait TransportFactory: Send + Sync {
    /// Builds a new, not yet logged-in client.
    fn create(&self) -> BoxedTransport;
}

/// Gives access to whichever client is live right now.
///
/// Handles are replaced on reconnect, so callers fetch the current one for
/// every operation instead of keeping it around.
pub trait ClientProvider: Send + Sync {
    /// The live client, if any.
    fn current(&self) -> Option<BoxedTransport>;

    /// The live client or [`TransportError::NotConnected`].
    fn require(&self) -> TransportResult<BoxedTransport> {
        self.current().ok_or(TransportError::NotConnected)
    }
}
