//! Configuration schema definitions.
//!
//! [`RawBotConfig`] mirrors the file as written: every key optional, kebab-case.
//! [`BotConfig`] is what the rest of the runtime consumes; converting one into
//! the other is where required keys are enforced.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::RetryPolicy;

use super::error::{ConfigError, ConfigResult};

// =============================================================================
// Raw (file) form
// =============================================================================

/// Bot configuration as read from the sources, before required keys are checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawBotConfig {
    /// Guild used when a lookup does not name one.
    pub guild_id: Option<String>,
    /// Login token.
    pub bot_token: Option<String>,
    /// OAuth client ID, used for the register URL.
    pub client_id: Option<String>,
    /// Bot version, shown in `--help`.
    pub version: Option<String>,
    /// Bot description, shown in `--help`.
    pub description: Option<String>,
    /// Named admin user IDs.
    pub admin_ids: HashMap<String, String>,
    /// Named channel IDs.
    pub channel_ids: HashMap<String, String>,
    /// Role names that grant moderator rights.
    pub mod_role_names: Vec<String>,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Connection supervisor timings.
    pub connection: ConnectionConfig,
    /// Guild lookup retry budget.
    pub resolver: ResolverConfig,
}

impl RawBotConfig {
    /// Keys that must be present, in the order they are checked.
    pub const REQUIRED_FIELDS: [&'static str; 5] =
        ["guild-id", "bot-token", "client-id", "version", "description"];
}

// =============================================================================
// Typed form
// =============================================================================

/// Validated bot configuration.
#[derive(Clone)]
pub struct BotConfig {
    pub guild_id: String,
    pub bot_token: String,
    pub client_id: String,
    pub version: String,
    pub description: String,
    /// Keys are lower-cased.
    pub admin_ids: HashMap<String, String>,
    /// Keys are lower-cased.
    pub channel_ids: HashMap<String, String>,
    /// Lower-cased.
    pub mod_role_names: Vec<String>,
    pub logging: LoggingConfig,
    pub connection: ConnectionConfig,
    pub resolver: ResolverConfig,
}

impl BotConfig {
    /// Looks up a named admin ID, case-insensitively.
    pub fn admin_id(&self, name: &str) -> Option<&str> {
        self.admin_ids
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// Looks up a named channel ID, case-insensitively.
    pub fn channel_id(&self, name: &str) -> Option<&str> {
        self.channel_ids
            .get(&name.to_lowercase())
            .map(String::as_str)
    }
}

impl TryFrom<RawBotConfig> for BotConfig {
    type Error = ConfigError;

    fn try_from(raw: RawBotConfig) -> ConfigResult<Self> {
        fn required(value: Option<String>, field: &str) -> ConfigResult<String> {
            value.ok_or_else(|| ConfigError::missing_field(field))
        }

        let [guild, token, client, version, description] = RawBotConfig::REQUIRED_FIELDS;

        Ok(Self {
            guild_id: required(raw.guild_id, guild)?,
            bot_token: required(raw.bot_token, token)?,
            client_id: required(raw.client_id, client)?,
            version: required(raw.version, version)?,
            description: required(raw.description, description)?,
            admin_ids: lowercase_keys(raw.admin_ids),
            channel_ids: lowercase_keys(raw.channel_ids),
            mod_role_names: raw
                .mod_role_names
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
            logging: raw.logging,
            connection: raw.connection,
            resolver: raw.resolver,
        })
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("guild_id", &self.guild_id)
            .field("bot_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("version", &self.version)
            .field("description", &self.description)
            .field("admin_ids", &self.admin_ids)
            .field("channel_ids", &self.channel_ids)
            .field("mod_role_names", &self.mod_role_names)
            .field("logging", &self.logging)
            .field("connection", &self.connection)
            .field("resolver", &self.resolver)
            .finish()
    }
}

fn lowercase_keys(map: HashMap<String, String>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect()
}

// =============================================================================
// Connection
// =============================================================================

/// Connection supervisor timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConnectionConfig {
    /// Wait between tearing a failed client down and creating the next one.
    pub backoff_ms: u64,
    /// Wait between the transport's ready signal and publishing `READY`.
    pub ready_settle_ms: u64,
    /// Wait between a successful reconnect and publishing `RECONNECTED`.
    pub reconnect_settle_ms: u64,
    /// Listener limit applied to a client shortly after it is ready.
    pub listener_limit: usize,
    /// Wait before applying the listener limit.
    pub listener_limit_delay_ms: u64,
    /// Close codes that mean "stop" rather than "reconnect".
    pub clean_disconnect_codes: Vec<u16>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 6000,
            ready_settle_ms: 1500,
            reconnect_settle_ms: 1000,
            listener_limit: 1000,
            listener_limit_delay_ms: 1000,
            clean_disconnect_codes: vec![0, 1000],
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Guild lookup retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            delay_ms: 200,
        }
    }
}

impl ResolverConfig {
    /// Converts into the resolver's policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lower-case name, as accepted by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` wins when set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file, used when `output` is `file`.
    pub file_path: Option<PathBuf>,
    /// Include thread IDs.
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
    /// Per-target levels, e.g. `tether_runtime::supervisor = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RawBotConfig {
        RawBotConfig {
            guild_id: Some("g1".into()),
            bot_token: Some("s3cr3t".into()),
            client_id: Some("42".into()),
            version: Some("1.1".into()),
            description: Some("Sittard raid bot".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_required_fields_checked_in_order() {
        let raw = RawBotConfig {
            guild_id: None,
            bot_token: None,
            ..complete()
        };
        let err = BotConfig::try_from(raw).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "guild-id"));

        let raw = RawBotConfig {
            description: None,
            ..complete()
        };
        let err = BotConfig::try_from(raw).unwrap_err();
        assert_eq!(err.to_string(), "Config property \"description\" is missing");
    }

    #[test]
    fn test_named_ids_are_case_insensitive() {
        let raw = RawBotConfig {
            admin_ids: HashMap::from([("Ash".to_string(), "u1".to_string())]),
            channel_ids: HashMap::from([("Raids".to_string(), "c1".to_string())]),
            mod_role_names: vec!["Moderator".into()],
            ..complete()
        };
        let config = BotConfig::try_from(raw).unwrap();

        assert_eq!(config.admin_id("ASH"), Some("u1"));
        assert_eq!(config.channel_id("raids"), Some("c1"));
        assert_eq!(config.channel_id("general"), None);
        assert_eq!(config.mod_role_names, vec!["moderator"]);
    }

    #[test]
    fn test_kebab_case_keys_and_defaults() {
        let raw: RawBotConfig = serde_json::from_str(
            r#"{
                "guild-id": "g1",
                "bot-token": "token",
                "connection": { "backoff-ms": 100 },
                "resolver": { "max-attempts": 2 }
            }"#,
        )
        .unwrap();

        assert_eq!(raw.guild_id.as_deref(), Some("g1"));
        assert_eq!(raw.connection.backoff_ms, 100);
        assert_eq!(raw.connection.clean_disconnect_codes, vec![0, 1000]);
        assert_eq!(raw.resolver.to_policy().max_attempts(), 2);
        assert_eq!(
            raw.resolver.to_policy().delay(),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = BotConfig::try_from(complete()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
    }
}
