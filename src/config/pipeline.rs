//! Pipeline configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::admission::{EndpointPolicy, DEFAULT_DEFERRABLE_ENDPOINTS};

/// Prefix of every environment variable read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "OFFLINE_PIPELINE_";

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment variable held an unusable value.
    #[error("invalid value for {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Values parsed but are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Task store backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-memory store; tasks do not survive a restart.
    #[default]
    InMemory,
    /// JSON-lines file `<dir>/<stream>.jsonl`.
    File {
        /// Directory holding the queue file.
        dir: PathBuf,
        /// Queue file stem.
        #[serde(default = "default_stream")]
        stream: String,
    },
}

fn default_stream() -> String {
    "offline_tasks".into()
}

const fn default_max_queue_size() -> usize {
    1000
}

const fn default_true() -> bool {
    true
}

const fn default_retry_interval_secs() -> u64 {
    60
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_DEFERRABLE_ENDPOINTS.iter().map(|s| (*s).to_string()).collect()
}

/// Root pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Admission limit on pending records.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// When false every request takes the immediate path.
    #[serde(default = "default_true")]
    pub offline_mode_enabled: bool,
    /// Resource paths eligible for deferral.
    #[serde(default = "default_endpoints")]
    pub deferrable_endpoints: Vec<String>,
    /// Self-wake delay after a retryable failure; 0 disables the timer.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Store backend.
    #[serde(default)]
    pub store: StoreBackendConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            offline_mode_enabled: true,
            deferrable_endpoints: default_endpoints(),
            retry_interval_secs: default_retry_interval_secs(),
            store: StoreBackendConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::Invalid("max_queue_size must be greater than 0".into()));
        }
        if self.offline_mode_enabled && self.deferrable_endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "deferrable_endpoints must not be empty when offline mode is enabled".into(),
            ));
        }
        if let StoreBackendConfig::File { stream, .. } = &self.store {
            if stream.is_empty() || stream.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!("invalid store stream name `{stream}`")));
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `OFFLINE_PIPELINE_*` variables, after loading a
    /// `.env` file if one exists.
    ///
    /// Recognized: `MAX_QUEUE_SIZE`, `OFFLINE_MODE_ENABLED`,
    /// `DEFERRABLE_ENDPOINTS` (comma separated), `RETRY_INTERVAL_SECS`,
    /// `STORE_DIR` (selects the file backend) and `STORE_STREAM`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Env` for unparsable values, `ConfigError::Invalid`
    /// if the result does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };
        let mut cfg = Self::default();

        if let Some((name, value)) = var("MAX_QUEUE_SIZE") {
            cfg.max_queue_size = parse(&name, &value)?;
        }
        if let Some((name, value)) = var("OFFLINE_MODE_ENABLED") {
            cfg.offline_mode_enabled = parse(&name, &value)?;
        }
        if let Some((_, value)) = var("DEFERRABLE_ENDPOINTS") {
            cfg.deferrable_endpoints = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some((name, value)) = var("RETRY_INTERVAL_SECS") {
            cfg.retry_interval_secs = parse(&name, &value)?;
        }
        if let Some((_, dir)) = var("STORE_DIR") {
            let stream = var("STORE_STREAM").map_or_else(default_stream, |(_, s)| s);
            cfg.store = StoreBackendConfig::File {
                dir: PathBuf::from(dir),
                stream,
            };
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Retry timer delay, `None` when disabled.
    #[must_use]
    pub const fn retry_interval(&self) -> Option<Duration> {
        if self.retry_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.retry_interval_secs))
        }
    }

    /// Allow-list as an endpoint policy.
    #[must_use]
    pub fn endpoint_policy(&self) -> EndpointPolicy {
        EndpointPolicy::new(self.deferrable_endpoints.iter().cloned())
    }
}

fn parse<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        reason: e.to_string(),
    })
}
