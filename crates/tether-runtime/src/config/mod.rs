//! Configuration module for the tether runtime.
//!
//! A bot is configured from one file (`config.json` by default) plus
//! `TETHER_*` environment overrides. The file uses kebab-case keys; they are
//! mapped once into the typed [`BotConfig`] and nothing else reads raw keys.

pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    BotConfig, ConnectionConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RawBotConfig,
    ResolverConfig,
};
pub use template::{DEFAULT_CONFIG_FILE, template, write_template};
pub use validation::validate_config;
