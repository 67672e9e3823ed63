//! Bot configuration
//!
//! Read from `config/bot.yaml` (or the file named by `GAVEL_CONFIG`). Every
//! key is optional, a missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Default config file location
pub const CONFIG_FILE: &str = "config/bot.yaml";
/// Environment variable overriding [`CONFIG_FILE`]
pub const CONFIG_ENV: &str = "GAVEL_CONFIG";
/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

const GUILDS_FILE: &str = "guilds.yaml";
const FUTURE_ACTIONS_FILE: &str = "future_actions.yaml";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("DISCORD_TOKEN must be set")]
    MissingToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Prefix for text commands
    pub prefix: String,
    /// Where guild state and queued actions are stored
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Days of message history removed alongside a ban
    pub ban_delete_message_days: u8,
    /// How often expired temp bans and mutes are checked
    pub future_action_interval_secs: u64,
    /// How long a pending confirmation stays valid, `None` for no expiry
    pub confirmation_window_secs: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            ban_delete_message_days: 7,
            future_action_interval_secs: 30,
            confirmation_window_secs: Some(60),
        }
    }
}

impl BotConfig {
    /// Load from the path in `GAVEL_CONFIG`, falling back to [`CONFIG_FILE`]
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV)
            .map_or_else(|_| PathBuf::from(CONFIG_FILE), PathBuf::from);
        Self::load(&path).await
    }

    /// Load from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Bot token from the environment
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingToken`] if the variable is unset or empty.
    pub fn token() -> Result<String, ConfigError> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    #[must_use]
    pub fn guilds_path(&self) -> PathBuf {
        self.data_dir.join(GUILDS_FILE)
    }

    #[must_use]
    pub fn future_actions_path(&self) -> PathBuf {
        self.data_dir.join(FUTURE_ACTIONS_FILE)
    }

    #[must_use]
    pub fn confirmation_window(&self) -> Option<chrono::Duration> {
        self.confirmation_window_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
    }

    #[must_use]
    pub fn future_action_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.future_action_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = BotConfig::parse("prefix: \"?\"\nconfirmation_window_secs: null\n")
            .expect("Failed to parse config");
        assert_eq!(config.prefix, "?");
        assert_eq!(config.ban_delete_message_days, 7);
        assert_eq!(config.confirmation_window(), None);
        assert_eq!(config.guilds_path(), PathBuf::from("data/guilds.yaml"));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(BotConfig::parse("").expect("empty is fine"), BotConfig::default());
    }

    #[test]
    fn test_durations() {
        let config = BotConfig {
            future_action_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.confirmation_window(), Some(chrono::Duration::seconds(60)));
        assert_eq!(config.future_action_interval(), std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join(format!("gavel-config-{}.yaml", uuid::Uuid::new_v4()));
        let config = BotConfig::load(&path).await.expect("missing file is not an error");
        assert_eq!(config, BotConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_file_is_error() {
        let path = std::env::temp_dir().join(format!("gavel-config-{}.yaml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "prefix: [unclosed").await.expect("write");
        let result = BotConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
