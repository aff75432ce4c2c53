//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, ConnectionConfig, LogOutput, LoggingConfig, ResolverConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BotConfig) -> ConfigResult<()> {
    validate_identity(config)?;
    validate_connection_config(&config.connection)?;
    validate_resolver_config(&config.resolver)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Required keys must not only exist but carry a value.
fn validate_identity(config: &BotConfig) -> ConfigResult<()> {
    let fields = [
        ("guild-id", &config.guild_id),
        ("bot-token", &config.bot_token),
        ("client-id", &config.client_id),
        ("version", &config.version),
        ("description", &config.description),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ConfigError::validation(format!("{name} must not be empty")));
        }
    }

    Ok(())
}

fn validate_connection_config(connection: &ConnectionConfig) -> ConfigResult<()> {
    if connection.backoff_ms == 0 {
        return Err(ConfigError::validation(
            "connection.backoff-ms must be greater than 0",
        ));
    }

    if connection.listener_limit == 0 {
        return Err(ConfigError::validation(
            "connection.listener-limit must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_resolver_config(resolver: &ResolverConfig) -> ConfigResult<()> {
    if resolver.max_attempts == 0 {
        return Err(ConfigError::validation(
            "resolver.max-attempts must be at least 1",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file-path is required when logging.output is \"file\"",
        ));
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
