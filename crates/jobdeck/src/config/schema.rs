use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poller::{PollConfig, RetryPolicy};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobdeckConfig {
    pub api: ApiConfig,
    pub poll: PollSettings,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

/// Analysis backend connection settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the analysis backend, e.g. `https://analysis.example.com`.
    pub base_url: String,
    /// Bearer token sent with every request. Never serialized back out.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Extra attempts for one-shot calls (start, approve, ...) when the
    /// backend cannot be reached. API errors are never retried.
    pub request_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            request_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "****"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("request_retries", &self.request_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Status polling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub max_consecutive_failures: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        let config = PollConfig::default();
        Self {
            interval_ms: config.interval.as_millis() as u64,
            max_attempts: config.max_attempts,
            max_consecutive_failures: config.retry.max_consecutive_failures,
            initial_backoff_ms: config.retry.initial_backoff.as_millis() as u64,
            max_backoff_ms: config.retry.max_backoff.as_millis() as u64,
            backoff_multiplier: config.retry.multiplier,
        }
    }
}

impl PollSettings {
    pub fn to_poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: self.max_attempts,
            retry: RetryPolicy {
                max_consecutive_failures: self.max_consecutive_failures,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                multiplier: self.backoff_multiplier,
            },
        }
    }
}

/// Where the job store is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Keep jobs across restarts. When false the store is memory-only.
    pub persist: bool,
    /// Database file. Defaults to `~/.jobdeck/data/jobdeck.db`.
    pub database_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: true,
            database_path: None,
        }
    }
}

impl StorageConfig {
    /// The database file to open, or `None` for a memory-only store.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        if !self.persist {
            return None;
        }
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings. `RUST_LOG` wins over `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info,jobdeck=debug".to_string(),
            format: LogFormat::Text,
        }
    }
}
