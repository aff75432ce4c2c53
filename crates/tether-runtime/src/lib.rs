//! Tether Runtime - Connection supervision and bot glue for tether.
//!
//! This crate provides:
//! - Connection supervision with reconnect and backoff (`ConnectionSupervisor`)
//! - Panic interception routed to `Error` events (`UncaughtExceptionGuard`)
//! - The `Bot` facade used by application code
//! - Configuration loading and the command line bootstrap
//! - Logging configuration
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_runtime::{Bot, Cli, NoArgs, Startup, bootstrap, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let Startup::Run { config, .. } = bootstrap(Cli::<NoArgs>::parse_with("my bot", "1.0"))? else {
//!         return Ok(());
//!     };
//!     logging::init_from_config(&config.logging);
//!
//!     let bot = Bot::new(config, Arc::new(my_platform_factory()));
//!     bot.on("MESSAGE", |event, _| Ok(()), Vec::new())?;
//!     bot.connect().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     bot.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod supervisor;
pub mod team;
pub mod text;

// Re-exports
pub use bot::Bot;
pub use cli::{Cli, NoArgs, Startup, bootstrap, register_url};
pub use config::{BotConfig, ConfigError, ConfigLoader, ConfigResult, RawBotConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use guard::{UncaughtExceptionGuard, shielded_publish};
pub use logging::LoggingBuilder;
pub use supervisor::{ConnectionState, ConnectionSupervisor, FailureClass, SupervisorSettings};
pub use team::Team;
pub use text::{MAX_MESSAGE_LENGTH, truncate_message};

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
///
/// Provides the logging macros and `Level` for span creation.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
