//! Runtime configuration for an engine session.
//!
//! # Responsibility
//! - Describe storage key, quick-update threshold, remote endpoint and log
//!   level in one serde-backed JSON document.
//! - Validate values before any store or remote is opened.
//!
//! # Invariants
//! - Missing fields fall back to `TaskflowConfig::default()` values.
//! - A config that passed `validate` always yields a usable `SyncPolicy`.

use crate::engine::sync_engine::{SyncPolicy, DEFAULT_QUICK_UPDATE_MAX_FIELDS};
use crate::logging::LogLevel;
use crate::store::task_list::DEFAULT_TASKS_KEY;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `log_level`.
pub const LOG_LEVEL_ENV: &str = "TASKFLOW_LOG_LEVEL";

const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;

/// Configuration load/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Read(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Remote endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteConfig {
    /// `None` selects the in-process source.
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskflowConfig {
    pub storage_key: String,
    pub quick_update_max_fields: usize,
    pub remote: RemoteConfig,
    pub log_level: String,
}

impl Default for TaskflowConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_TASKS_KEY.to_string(),
            quick_update_max_fields: DEFAULT_QUICK_UPDATE_MAX_FIELDS,
            remote: RemoteConfig::default(),
            log_level: crate::logging::default_log_level().to_string(),
        }
    }
}

impl TaskflowConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Replaces `log_level` with `value` when it is present and non-blank.
    pub fn with_log_level_override(mut self, value: Option<&str>) -> Self {
        if let Some(level) = value.map(str::trim).filter(|level| !level.is_empty()) {
            self.log_level = level.to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storageKey cannot be empty".to_string(),
            ));
        }
        if self.remote.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "remote.timeoutMs must be positive".to_string(),
            ));
        }
        if let Some(base_url) = &self.remote.base_url {
            if base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "remote.baseUrl cannot be blank".to_string(),
                ));
            }
        }
        LogLevel::parse(&self.log_level).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            quick_update_max_fields: self.quick_update_max_fields,
        }
    }
}
