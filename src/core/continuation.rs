//! In-process success/failure callbacks for deferred and immediate requests.
//!
//! Continuations live only in memory. A task reloaded from disk after a restart
//! has no entry here and resolves silently.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;

use crate::core::error::TransportError;
use crate::util::serde::{ResponseBody, TaskId};

/// Callback invoked with the response document on success.
pub type SuccessHandler = Box<dyn FnOnce(ResponseBody) + Send + 'static>;

/// Callback invoked with failure details.
pub type FailureHandler = Box<dyn FnOnce(FailureInfo) + Send + 'static>;

/// Details handed to a failure continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureInfo {
    /// Task the failure belongs to; `None` for immediate sends.
    pub task_id: Option<TaskId>,
    /// Human-readable cause.
    pub reason: String,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Error document returned by the server, if any.
    pub body: Option<ResponseBody>,
}

impl FailureInfo {
    /// Failure without a server response.
    pub fn new(task_id: Option<TaskId>, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            reason: reason.into(),
            status: None,
            body: None,
        }
    }

    /// Build from a transport error.
    #[must_use]
    pub fn from_transport(task_id: Option<TaskId>, err: &TransportError) -> Self {
        match err {
            TransportError::Permanent { status, body, .. } => Self {
                task_id,
                reason: err.to_string(),
                status: Some(*status),
                body: body.clone(),
            },
            TransportError::Retryable { status, .. } => Self {
                task_id,
                reason: err.to_string(),
                status: *status,
                body: None,
            },
            TransportError::AuthRefresh { .. } => Self {
                task_id,
                reason: err.to_string(),
                status: Some(401),
                body: None,
            },
        }
    }
}

/// Optional pair of callbacks attached to a request.
#[derive(Default)]
pub struct Continuation {
    /// Called once with the response on success.
    pub on_success: Option<SuccessHandler>,
    /// Called once with the failure details.
    pub on_failure: Option<FailureHandler>,
}

impl Continuation {
    /// True when neither callback is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.on_success.is_none() && self.on_failure.is_none()
    }

    /// Run the success callback, if any.
    pub fn succeed(self, body: ResponseBody) {
        if let Some(handler) = self.on_success {
            guard("success continuation", || handler(body));
        }
    }

    /// Run the failure callback, if any.
    pub fn fail(self, info: FailureInfo) {
        if let Some(handler) = self.on_failure {
            guard("failure continuation", || handler(info));
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Run host code without letting a panic take down a worker thread.
pub(crate) fn guard(what: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(callback = what, "host callback panicked");
    }
}

/// Continuations of tasks scheduled in this process, keyed by task id.
#[derive(Debug, Default)]
pub struct ContinuationRegistry {
    entries: Mutex<HashMap<TaskId, Continuation>>,
}

impl ContinuationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `create` and register `continuation` under the returned id while holding
    /// the registry lock, so a concurrent resolver cannot miss the entry.
    ///
    /// On error the continuation is handed back untouched.
    pub fn register_with<E, F>(&self, continuation: Continuation, create: F) -> Result<TaskId, (E, Continuation)>
    where
        F: FnOnce() -> Result<TaskId, E>,
    {
        let mut entries = self.entries.lock();
        match create() {
            Ok(id) => {
                if !continuation.is_empty() {
                    entries.insert(id.clone(), continuation);
                }
                Ok(id)
            }
            Err(e) => Err((e, continuation)),
        }
    }

    /// Remove and return the continuation for `id`.
    pub fn take(&self, id: &str) -> Option<Continuation> {
        self.entries.lock().remove(id)
    }

    /// Run `clear` and drop every registered continuation while holding the
    /// registry lock, so a task created concurrently either is cleared with its
    /// continuation or keeps both. Returns `clear`'s value and the number of
    /// continuations discarded.
    ///
    /// # Errors
    ///
    /// Returns `clear`'s error; the registry is left untouched.
    pub fn clear_with<T, E, F>(&self, clear: F) -> Result<(T, usize), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let (value, discarded) = {
            let mut entries = self.entries.lock();
            let value = clear()?;
            (value, std::mem::take(&mut *entries))
        };
        Ok((value, discarded.len()))
    }

    /// Number of registered continuations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
