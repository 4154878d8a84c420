//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/chatsync/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/chatsync/` (~/.config/chatsync/)
//! - Data: `$XDG_DATA_HOME/chatsync/` (~/.local/share/chatsync/)
//! - State/Logs: `$XDG_STATE_HOME/chatsync/` (~/.local/state/chatsync/)

use crate::error::{Error, Result};
use crate::types::UserId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[session] user_id`.
pub const USER_ENV: &str = "CHATSYNC_USER";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Document store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Signed-in user stand-in for the auth collaborator
    #[serde(default)]
    pub session: SessionConfig,

    /// Favorites listing
    #[serde(default)]
    pub favorites: FavoritesConfig,

    /// List view behavior
    #[serde(default)]
    pub list: ListConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which [`DocumentStore`](crate::store::DocumentStore) backend to open
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Store configuration
#[derive(Debug, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Override for the SQLite file (defaults to [`Config::database_path`])
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Config::database_path)
    }
}

/// Session configuration
#[derive(Debug, Deserialize, Default)]
pub struct SessionConfig {
    /// User id to sign in as at startup
    pub user_id: Option<String>,
}

/// Which favorite records a user can list
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FavoritesScope {
    /// Only the signed-in user's records
    #[default]
    Owner,
    /// Every record in the collection, whoever owns it
    Global,
}

/// Favorites configuration
#[derive(Debug, Deserialize, Default)]
pub struct FavoritesConfig {
    #[serde(default)]
    pub scope: FavoritesScope,
}

/// What to do with a toggle on a row whose previous toggle is in flight
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PendingTogglePolicy {
    /// Refuse the toggle and notify
    #[default]
    Reject,
    /// Remember it and issue it once the in-flight one settles
    Queue,
}

/// List view configuration
#[derive(Debug, Deserialize, Default)]
pub struct ListConfig {
    #[serde(default)]
    pub pending_toggle: PendingTogglePolicy,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(uid) = &self.session.user_id {
            UserId::new(uid.as_str()).map_err(|_| {
                Error::Config(format!("session.user_id is not a valid user id: {:?}", uid))
            })?;
        }
        if self.logging.max_files == 0 {
            return Err(Error::Config(
                "logging.max_files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The user to sign in as: `CHATSYNC_USER` first, then `[session] user_id`.
    pub fn startup_user(&self) -> Result<Option<UserId>> {
        let raw = std::env::var(USER_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.session.user_id.clone());
        raw.map(UserId::new).transpose()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/chatsync/config.toml` (~/.config/chatsync/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("chatsync").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite document store)
    ///
    /// `$XDG_DATA_HOME/chatsync/` (~/.local/share/chatsync/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("chatsync")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/chatsync/` (~/.local/state/chatsync/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("chatsync")
    }

    /// Returns the document store file path
    ///
    /// `$XDG_DATA_HOME/chatsync/documents.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("documents.db")
    }
}
