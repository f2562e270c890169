//! Task records and the serialized form of a deferred API call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::continuation::{Continuation, FailureInfo};
use crate::util::serde::{RequestBody, ResponseBody, TaskId};

/// How a record's payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Payload is a [`SerializedRequest`] to replay through the transport.
    ApiCall,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiCall => f.write_str("api_call"),
        }
    }
}

/// FIFO order key: creation time, ties broken by the store's insertion counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u64,
    /// Monotonic per-store insertion counter.
    pub seq: u64,
}

/// A persisted unit of deferred work. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier assigned by the store.
    pub id: TaskId,
    /// Payload interpretation.
    pub kind: TaskKind,
    /// Opaque serialized payload.
    pub payload: String,
    /// FIFO position.
    pub created_at: OrderKey,
}

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Payload of an [`TaskKind::ApiCall`] record.
///
/// The auth token is captured when the task is created and replayed as-is; it is
/// never swapped for whatever token is current at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRequest {
    /// Credential/tenant identifier valid at enqueue time.
    pub target_key: String,
    /// Logical endpoint, e.g. `events/track`.
    pub resource_path: String,
    /// Order-preserving request document.
    pub body: RequestBody,
    /// HTTP verb.
    pub method: HttpMethod,
    /// Bearer credential captured at enqueue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl SerializedRequest {
    /// Encode into a record payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body cannot be encoded.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a record payload.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is malformed.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// An outgoing API call as handed to the admission filter.
///
/// Continuations are in-process only: they are never written to the store, so a
/// task reloaded after a restart resolves without invoking any of them.
pub struct ApiRequest {
    /// The replayable part of the call.
    pub request: SerializedRequest,
    /// Optional success/failure callbacks.
    pub continuation: Continuation,
}

impl ApiRequest {
    /// Create a `POST` request with an empty body.
    pub fn post(target_key: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, target_key, resource_path)
    }

    /// Create a `GET` request with an empty body.
    pub fn get(target_key: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, target_key, resource_path)
    }

    fn new(method: HttpMethod, target_key: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self {
            request: SerializedRequest {
                target_key: target_key.into(),
                resource_path: resource_path.into(),
                body: RequestBody::new(),
                method,
                auth_token: None,
            },
            continuation: Continuation::default(),
        }
    }

    /// Replace the request document.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.request.body = body;
        self
    }

    /// Append one field to the request document, keeping insertion order.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.request.body.insert(key.into(), value.into());
        self
    }

    /// Attach the bearer token current at enqueue time.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.request.auth_token = Some(token.into());
        self
    }

    /// Register a success callback.
    #[must_use]
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ResponseBody) + Send + 'static,
    {
        self.continuation.on_success = Some(Box::new(f));
        self
    }

    /// Register a failure callback.
    #[must_use]
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(FailureInfo) + Send + 'static,
    {
        self.continuation.on_failure = Some(Box::new(f));
        self
    }

    /// Logical endpoint of this request.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        &self.request.resource_path
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.request.method)
            .field("resource_path", &self.request.resource_path)
            .field("has_continuation", &!self.continuation.is_empty())
            .finish_non_exhaustive()
    }
}
