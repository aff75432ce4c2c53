//! # Tether
//!
//! A resilience layer that keeps a chat bot running.
//!
//! ## Overview
//!
//! Tether sits between a platform client and the bot's own code. It keeps
//! the connection alive, turns the client's callbacks into a small closed set
//! of events, and stops one bad handler from taking the process down.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  RawEvent  ┌──────────────────────┐  Event  ┌─────────────────┐
//! │ Transport │───────────▶│ ConnectionSupervisor │────────▶│ EventDispatcher │──▶ subscribers
//! └─────┬─────┘            └──────────────────────┘         └────────▲────────┘
//!       │ cache                                                      │ Error
//!       ▼                                               ┌────────────┴───────────┐
//! ┌──────────────────┐                                  │ UncaughtExceptionGuard │
//! │ ResourceResolver │──▶ Guild / Member / Channel      └────────────────────────┘
//! └──────────────────┘
//! ```
//!
//! - **Supervisor**: logs in, recreates the client after abnormal disconnects
//!   and transient errors, publishes `READY` / `RECONNECTED`
//! - **Dispatcher**: synchronous publish/subscribe keyed by event kind
//! - **Resolver**: guild lookups retried while the client's cache fills
//! - **Guard**: panics anywhere in the process become `ERROR` events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let Startup::Run { config, .. } = bootstrap(Cli::<NoArgs>::parse_with("raid bot", "1.0"))? else {
//!         return Ok(());
//!     };
//!
//!     let bot = Bot::new(config, Arc::new(MemoryNetwork::new()));
//!     bot.on("MESSAGE", |event, _| {
//!         info!("{}", event.as_message().unwrap().content);
//!         Ok(())
//!     }, Vec::new())?;
//!     bot.connect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `json-config`: JSON configuration files (default)
//! - `toml-config`: TOML configuration files
//! - `json-log`: JSON log output

pub use tether_core as core;
pub use tether_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Entry points
    pub use tether_runtime::{Bot, BotConfig, Cli, NoArgs, Startup, bootstrap};

    // Events
    pub use tether_core::{BoundArg, ErrorOrigin, ErrorReport, Event, EventDispatcher, EventKind};

    // Platform objects
    pub use tether_core::{Channel, ChatMessage, Emoji, Guild, Member, Role, User};

    // Transport boundary
    pub use tether_core::{ClientProvider, MemoryNetwork, RawEvent, Transport, TransportFactory};

    // Resilience
    pub use tether_core::{ResourceResolver, RetryPolicy};
    pub use tether_runtime::{ConnectionState, ConnectionSupervisor, UncaughtExceptionGuard};

    // Helpers
    pub use tether_runtime::team::{Team, team_of_member, user_has_role, user_is_mod};
    pub use tether_runtime::text::truncate_message;

    // Logging
    pub use tether_runtime::prelude::*;
}
