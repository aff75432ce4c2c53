//! Configuration loader using figment.
//!
//! # Sources (lowest to highest priority)
//!
//! 1. Built-in defaults for optional sections
//! 2. The configuration file (`tether.json` / `config.json`, or TOML with `toml-config`)
//! 3. Environment variables (`TETHER_*`)
//!
//! # Feature Flags
//!
//! - `json-config` *(default)*: JSON configuration files
//! - `toml-config`: TOML configuration files (`tether.toml`, `config.toml`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `TETHER_` prefix, `__` for nesting and `_` for the
//! dashes of kebab-case keys:
//!
//! - `TETHER_BOT_TOKEN=xxx` → `bot-token = "xxx"`
//! - `TETHER_CONNECTION__BACKOFF_MS=3000` → `connection.backoff-ms = 3000`
//! - `TETHER_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! ```rust,ignore
//! use tether_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().file("config.json").load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "json-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "json-config")]
use figment::providers::Json;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
use figment::providers::Env;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, RawBotConfig};
use super::validation::validate_config;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "TETHER_";

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Loads the sources without checking required keys.
    pub fn load_raw(self) -> ConfigResult<RawBotConfig> {
        let figment = self.build_figment()?;
        Ok(figment.extract()?)
    }

    /// Loads, maps and validates the configuration.
    pub fn load(self) -> ConfigResult<BotConfig> {
        let config = BotConfig::try_from(self.load_raw()?)?;
        validate_config(&config)?;

        debug!(
            guild_id = %config.guild_id,
            version = %config.version,
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::new();

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .replace("__", ".")
                    .replace('_', "-")
                    .into()
            }));
        }

        Ok(figment)
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    ///
    /// Only extensions enabled via feature flags are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "json-config")]
            "json" => Ok(figment.merge(Json::file(path))),
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tether"));
        }
        paths
    }

    /// File names tried in every search path, in order.
    fn candidate_names() -> Vec<&'static str> {
        let mut names = Vec::new();
        #[cfg(feature = "json-config")]
        names.extend(["tether.json", "config.json"]);
        #[cfg(feature = "toml-config")]
        names.extend(["tether.toml", "config.toml"]);
        names
    }

    /// Merges the first configuration file found.
    fn load_config_files(&self, figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for name in Self::candidate_names() {
                let path = search_path.join(name);
                if !path.exists() {
                    continue;
                }
                info!(path = %path.display(), "Loading configuration file");
                match Self::merge_config_file(figment.clone(), &path) {
                    Ok(merged) => return merged,
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping configuration file"),
                }
            }
        }

        warn!("No configuration file found, you can generate one with --generate");
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<BotConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<BotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, feature = "json-config"))]
mod tests {
    use super::*;
    use figment::Jail;

    const CONFIG: &str = r#"{
        "guild-id": "g1",
        "bot-token": "from-file",
        "client-id": "42",
        "version": "1.1",
        "description": "Sittard raid bot",
        "channel-ids": { "raids": "c1" }
    }"#;

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("config.json", CONFIG)?;
            jail.set_env("TETHER_BOT_TOKEN", "from-env");
            jail.set_env("TETHER_CONNECTION__BACKOFF_MS", "250");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();

            assert_eq!(config.bot_token, "from-env");
            assert_eq!(config.connection.backoff_ms, 250);
            assert_eq!(config.channel_id("RAIDS"), Some("c1"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_required_field() {
        Jail::expect_with(|jail| {
            jail.create_file("config.json", r#"{ "bot-token": "t" }"#)?;

            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap_err();

            assert!(matches!(err, ConfigError::MissingField { ref field } if field == "guild-id"));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        Jail::expect_with(|jail| {
            let err = ConfigLoader::new()
                .file(jail.directory().join("nope.json"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("config.ini", "guild-id = g1")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("config.ini"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)));
            Ok(())
        });
    }
}
