//! Bot configuration
//!
//! Loaded from a YAML file; every field has a default so a missing file or a partial
//! file both work. The Discord token is read from the environment, never from here.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SHIFT_WARDEN_CONFIG";
/// Config file used when the environment variable is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/bot_config.yaml";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Bot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Directory holding the record files
    pub data_dir: PathBuf,
    /// Directory for rolling command logs
    pub log_dir: PathBuf,
    /// Role name granting High Rank (warn, retract, adjust)
    pub high_rank_role: String,
    /// Role name granting Low Rank (warn)
    pub low_rank_role: String,
    /// Leaderboard size when none is requested
    pub leaderboard_size: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            high_rank_role: "─────────── High Rank ───────────".to_string(),
            low_rank_role: "─────────── Low Rank ───────────".to_string(),
            leaderboard_size: crate::leaderboard::DEFAULT_LIMIT,
        }
    }
}

impl BotConfig {
    /// Load from `$SHIFT_WARDEN_CONFIG`, or the default path
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        Self::load_from(&path).await
    }

    /// Load from `path`; a missing file yields the defaults
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns the YAML error if the document is malformed
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = BotConfig::from_yaml("leaderboard_size: 5\nhigh_rank_role: Admin\n").unwrap();
        assert_eq!(config.leaderboard_size, 5);
        assert_eq!(config.high_rank_role, "Admin");
        assert_eq!(config.low_rank_role, BotConfig::default().low_rank_role);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BotConfig::from_yaml("").unwrap(), BotConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = BotConfig {
            data_dir: PathBuf::from("/var/lib/shift-warden"),
            ..Default::default()
        };
        let serialized = serde_yaml::to_string(&config).expect("Failed to serialize");
        assert!(serialized.contains("data_dir: /var/lib/shift-warden"));
        assert!(serialized.contains("leaderboard_size: 10"));

        let deserialized = BotConfig::from_yaml(&serialized).expect("Failed to deserialize");
        assert_eq!(deserialized, config);
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load_from(&dir.path().join("absent.yaml"))
            .await
            .unwrap();
        assert_eq!(config, BotConfig::default());
    }

    #[tokio::test]
    async fn test_malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_config.yaml");
        tokio::fs::write(&path, "leaderboard_size: [").await.unwrap();

        let result = BotConfig::load_from(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
