//! Starter configuration file.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::info;

use super::error::{ConfigError, ConfigResult};
use super::schema::RawBotConfig;

/// File written by `--generate` when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// A configuration with placeholders for every required key.
pub fn template() -> RawBotConfig {
    RawBotConfig {
        guild_id: Some("GUILD_ID".into()),
        bot_token: Some("BOT_TOKEN".into()),
        client_id: Some("CLIENT_ID".into()),
        version: Some("0.1.0".into()),
        description: Some("Describe your bot here".into()),
        admin_ids: HashMap::from([("owner".to_string(), "USER_ID".to_string())]),
        channel_ids: HashMap::from([("general".to_string(), "CHANNEL_ID".to_string())]),
        mod_role_names: vec!["moderator".into()],
        ..Default::default()
    }
}

/// Writes [`template`] as pretty JSON to `path`.
///
/// An existing file is never overwritten; that case is
/// [`ConfigError::AlreadyExists`].
pub fn write_template<P: AsRef<Path>>(path: P) -> ConfigResult<()> {
    let path = path.as_ref();
    let rendered = serde_json::to_string_pretty(&template())?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ConfigError::AlreadyExists(path.to_path_buf()),
            _ => ConfigError::Io(e),
        })?;
    file.write_all(rendered.as_bytes())?;
    file.write_all(b"\n")?;

    info!(path = %path.display(), "Configuration template written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BotConfig;

    #[test]
    fn test_template_satisfies_required_fields() {
        let rendered = serde_json::to_string(&template()).unwrap();
        let raw: RawBotConfig = serde_json::from_str(&rendered).unwrap();

        assert!(rendered.contains("\"bot-token\""));
        assert!(BotConfig::try_from(raw).is_ok());
    }

    #[test]
    fn test_write_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("tether-template-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(DEFAULT_CONFIG_FILE);
        let _ = std::fs::remove_file(&path);

        write_template(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(first.contains("GUILD_ID"));

        let err = write_template(&path).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
