//! Configuration loader
//!
//! Reads `config.toml` from the platform config directory. Every section and
//! key is optional; a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Upper bound for `participation.write_retries`
pub const MAX_WRITE_RETRIES: u32 = 20;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DormConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub participation: ParticipationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; defaults to `dormhub.db` in the data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How long a write waits for a competing writer's lock
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipationConfig {
    /// Re-reads after a lost conditional write before giving up
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,
    /// Name shown in place of an anonymous participant
    #[serde(default = "default_anonymous_label")]
    pub anonymous_label: String,
}

impl Default for ParticipationConfig {
    fn default() -> Self {
        Self {
            write_retries: default_write_retries(),
            anonymous_label: default_anonymous_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Broadcast new events to their dorm
    #[serde(default = "default_true")]
    pub announce_new_events: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            announce_new_events: true,
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_write_retries() -> u32 {
    2
}

fn default_anonymous_label() -> String {
    "Anonymous participant".to_string()
}

fn default_true() -> bool {
    true
}

impl DormConfig {
    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DormConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from the platform config directory
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Database path from config, or the platform data directory
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("dormhub.db")),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.participation.anonymous_label.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "participation.anonymous_label",
                reason: "must not be empty".into(),
            });
        }
        if self.participation.write_retries > MAX_WRITE_RETRIES {
            return Err(ConfigError::Invalid {
                key: "participation.write_retries",
                reason: format!("must be at most {MAX_WRITE_RETRIES}"),
            });
        }
        Ok(())
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("org", "dormhub", "dormhub").ok_or(ConfigError::NoConfigDir)
}
