//! # Tether Core
//!
//! The building blocks of tether that do not depend on a running connection:
//!
//! - **Events**: the closed [`EventKind`] set and payload-carrying [`Event`]s
//! - **Dispatcher**: the in-process bus consumers subscribe to ([`EventDispatcher`])
//! - **Transport boundary**: the traits a platform client implements
//!   ([`Transport`], [`TransportFactory`], [`ClientProvider`]) plus an
//!   in-memory loopback ([`MemoryNetwork`])
//! - **Resolver**: bounded-retry lookup of guilds, members and channels
//!   ([`ResourceResolver`])
//!
//! The connection supervisor that ties these together lives in `tether-runtime`.
//!
//! ```text
//! ┌───────────┐  RawEvent  ┌────────────┐  Event  ┌────────────┐
//! │ Transport │───────────▶│ Supervisor │────────▶│ Dispatcher │──▶ subscribers
//! └─────┬─────┘            └────────────┘         └────────────┘
//!       │ cache
//!       ▼
//! ┌──────────┐
//! │ Resolver │──▶ Guild / Member / Channel
//! └──────────┘
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod model;
pub mod resolver;
pub mod transport;

pub use dispatcher::{BoundArg, Callback, EventDispatcher, Subscription};
pub use error::{
    ConnectionError, DispatchError, DispatchResult, ResolutionError, ResolutionResult,
    TransportError, TransportResult,
};
pub use event::{ErrorOrigin, ErrorReport, Event, EventKind};
pub use model::{Channel, ChatMessage, Emoji, Guild, Member, Role, User};
pub use resolver::{ResourceResolver, RetryPolicy};
pub use transport::memory::{MemoryNetwork, MemoryTransport, SentMessage};
pub use transport::{
    BoxedTransport, ClientProvider, RawEvent, RawEventSink, Transport, TransportFactory,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        ChatMessage, ClientProvider, Event, EventDispatcher, EventKind, RawEvent,
        ResourceResolver, RetryPolicy, Transport, TransportFactory,
    };
}
