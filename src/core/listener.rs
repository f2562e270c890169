//! Completion listeners notified on every terminal task resolution.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::continuation::guard;
use crate::util::serde::ResponseBody;

/// Terminal outcome of a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskOutcome {
    /// Transport returned 2xx; the record was deleted.
    Success,
    /// Non-retryable failure; the record was deleted and the event dropped.
    Failure,
}

/// Observer of deferred task resolutions.
///
/// Invoked on the runner thread; implementations should hand work off rather
/// than block.
pub trait CompletionListener: Send + Sync {
    /// A task reached a terminal outcome. `response` is the success document or
    /// the server's error document when one was returned.
    fn on_task_completed(&self, task_id: &str, outcome: TaskOutcome, response: Option<&ResponseBody>);
}

impl<F> CompletionListener for F
where
    F: Fn(&str, TaskOutcome, Option<&ResponseBody>) + Send + Sync,
{
    fn on_task_completed(&self, task_id: &str, outcome: TaskOutcome, response: Option<&ResponseBody>) {
        self(task_id, outcome, response);
    }
}

/// Registered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn CompletionListener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The same listener may be registered more than once.
    pub fn add(&self, listener: Arc<dyn CompletionListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove every registration of `listener`, returning whether any existed.
    pub fn remove(&self, listener: &Arc<dyn CompletionListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Notify all listeners, outside the registry lock.
    pub fn notify(&self, task_id: &str, outcome: TaskOutcome, response: Option<&ResponseBody>) {
        let snapshot: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in snapshot {
            guard("completion listener", || {
                listener.on_task_completed(task_id, outcome, response);
            });
        }
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True when no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry").field("len", &self.len()).finish()
    }
}
