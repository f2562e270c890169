//! Error types for pipeline operations.

use thiserror::Error;

use crate::util::serde::ResponseBody;

/// Failure reading or writing persisted task records.
///
/// Any `StoreError` observed by the pipeline trips the health monitor's
/// circuit breaker for the rest of the process lifetime.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem or device failure (disk full, permissions, missing volume).
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Persisted state is inconsistent.
    #[error("store corrupt: {0}")]
    Corrupt(String),
}

/// Failure reported by the external transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Timeout, connection refused, 5xx. The task is kept and retried later.
    #[error("retryable transport failure: {reason}")]
    Retryable {
        /// Human-readable cause.
        reason: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
    },
    /// 4xx other than auth refresh. The task is dropped and the failure reported.
    #[error("permanent transport failure ({status}): {reason}")]
    Permanent {
        /// HTTP status returned by the server.
        status: u16,
        /// Human-readable cause.
        reason: String,
        /// Error document returned by the server, if any.
        body: Option<ResponseBody>,
    },
    /// Credentials were rejected and need refreshing; handled like a retryable failure.
    #[error("auth refresh required: {reason}")]
    AuthRefresh {
        /// Human-readable cause.
        reason: String,
    },
}

impl TransportError {
    /// Whether the task should stay in the store and be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. } | Self::AuthRefresh { .. })
    }

    /// Convenience constructor for a connection-level retryable failure.
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
            status: None,
        }
    }

    /// Convenience constructor for a permanent failure without a body.
    pub fn permanent(status: u16, reason: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            reason: reason.into(),
            body: None,
        }
    }
}

/// Errors surfaced by the pipeline to its host.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Persisting or reading a task failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A request could not be encoded into a task payload.
    #[error("request serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The pipeline (or one of its worker threads) has been shut down.
    #[error("pipeline has been shut down")]
    Shutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Thread(std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
