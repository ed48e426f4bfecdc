use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::ensure_parent_dir;
use crate::storage::sqlite_set::DEFAULT_DATABASE_PATH;

pub const DEFAULT_CONFIG_PATH: &str = "config/channel_history.json";

/// Environment variable overriding `database_path`.
pub const DATABASE_ENV_VAR: &str = "CHANNEL_HISTORY_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_user_name() -> String {
    "anonymous".to_string()
}

fn default_user_id() -> String {
    "0".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            user_name: default_user_name(),
            user_id: default_user_id(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Replace `database_path` with a non-empty override, typically read from
    /// [`DATABASE_ENV_VAR`].
    pub fn apply_database_override(&mut self, value: Option<String>) {
        if let Some(path) = value.filter(|path| !path.trim().is_empty()) {
            log::info!("Using database {path} from {DATABASE_ENV_VAR}");
            self.database_path = path;
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.database_path, "data/history.db");
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_config(path.to_str().unwrap()), AppConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"user_name":"John Doe"}"#).unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.user_name, "John Doe");
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn save_then_load_preserves_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.user_name = "John Doe".into();
        config.user_id = "1234".into();
        save_config(path, &config).unwrap();

        assert_eq!(load_config(path), config);
    }

    #[test]
    fn database_override_ignores_blank_values() {
        let mut config = AppConfig::default();

        config.apply_database_override(Some("   ".into()));
        assert_eq!(config.database_path, "data/history.db");

        config.apply_database_override(None);
        assert_eq!(config.database_path, "data/history.db");

        config.apply_database_override(Some("/tmp/other.db".into()));
        assert_eq!(config.database_path, "/tmp/other.db");
    }

    #[test]
    fn poll_interval_is_never_zero() {
        let config = AppConfig {
            poll_interval_ms: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
