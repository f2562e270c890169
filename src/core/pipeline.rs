//! Host-facing facade owning every pipeline component.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::core::admission::{AdmissionFilter, Outcome};
use crate::core::continuation::{ContinuationRegistry, FailureInfo};
use crate::core::dispatcher::ImmediateDispatcher;
use crate::core::error::PipelineError;
use crate::core::health::{HealthMonitor, HealthSnapshot};
use crate::core::listener::{CompletionListener, ListenerRegistry};
use crate::core::runner::{Runner, RunnerDiagnostics, WakeReason};
use crate::core::store::TaskStore;
use crate::core::task::ApiRequest;
use crate::util::serde::TaskId;

/// How long `shutdown` waits for each worker thread.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Offline task pipeline: admission, durable queue, runner and immediate path.
///
/// Build one with [`PipelineBuilder`](crate::builders::PipelineBuilder).
pub struct OfflinePipeline {
    store: Arc<dyn TaskStore>,
    health: Arc<HealthMonitor>,
    continuations: Arc<ContinuationRegistry>,
    listeners: Arc<ListenerRegistry>,
    admission: AdmissionFilter,
    dispatcher: Arc<ImmediateDispatcher>,
    runner: Runner,
    closed: AtomicBool,
}

/// Components assembled by the builder.
pub(crate) struct PipelineParts {
    pub store: Arc<dyn TaskStore>,
    pub health: Arc<HealthMonitor>,
    pub continuations: Arc<ContinuationRegistry>,
    pub listeners: Arc<ListenerRegistry>,
    pub admission: AdmissionFilter,
    pub dispatcher: Arc<ImmediateDispatcher>,
    pub runner: Runner,
}

impl OfflinePipeline {
    pub(crate) fn from_parts(parts: PipelineParts) -> Self {
        Self {
            store: parts.store,
            health: parts.health,
            continuations: parts.continuations,
            listeners: parts.listeners,
            admission: parts.admission,
            dispatcher: parts.dispatcher,
            runner: parts.runner,
            closed: AtomicBool::new(false),
        }
    }

    /// Route an outgoing API call. Returns after at most one local store write.
    pub fn submit(&self, request: ApiRequest) -> Outcome {
        if self.closed.load(Ordering::Acquire) {
            request
                .continuation
                .fail(FailureInfo::new(None, "pipeline has been shut down"));
            return Outcome::Dropped;
        }
        self.admission.submit(request)
    }

    /// Delete every pending task and discard their continuations.
    ///
    /// A task already executing is not cancelled.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if the store cannot be cleared; the
    /// breaker is opened.
    pub fn clear_all(&self) -> Result<usize, PipelineError> {
        match self.continuations.clear_with(|| self.store.clear_all()) {
            Ok((removed, discarded)) => {
                info!(removed, discarded_continuations = discarded, "cleared offline task queue");
                Ok(removed)
            }
            Err(e) => {
                self.health.on_storage_error(&e);
                Err(e.into())
            }
        }
    }

    /// The active user changed: queued events must not be sent under the new identity.
    ///
    /// # Errors
    ///
    /// Same as [`clear_all`](Self::clear_all).
    pub fn on_user_changed(&self) -> Result<usize, PipelineError> {
        info!("user changed, dropping queued events");
        self.clear_all()
    }

    /// Register a completion listener.
    pub fn add_completion_listener(&self, listener: Arc<dyn CompletionListener>) {
        self.listeners.add(listener);
    }

    /// Unregister a completion listener. Returns whether it was registered.
    pub fn remove_completion_listener(&self, listener: &Arc<dyn CompletionListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Ask the runner for a drain cycle.
    pub fn wake(&self) {
        self.runner.wake(WakeReason::Manual);
    }

    /// Ids of pending tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if the store cannot be read.
    pub fn pending_task_ids(&self) -> Result<Vec<TaskId>, PipelineError> {
        Ok(self.store.all_ids()?)
    }

    /// Health gates and queue length.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    /// Runner state.
    #[must_use]
    pub fn diagnostics(&self) -> RunnerDiagnostics {
        self.runner.diagnostics()
    }

    /// Whether `resource_path` would currently be deferred.
    #[must_use]
    pub fn is_deferrable(&self, resource_path: &str) -> bool {
        self.admission.is_deferrable(resource_path)
    }

    /// Block until the runner and the immediate dispatcher have no outstanding
    /// work, or `timeout` elapses.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.dispatcher.wait_for_idle(timeout)
            && self
                .runner
                .wait_for_idle(deadline.saturating_duration_since(Instant::now()))
    }

    /// Stop both worker threads. Pending tasks stay in the store. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.runner.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        self.dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        info!("offline pipeline stopped");
    }
}

impl std::fmt::Debug for OfflinePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflinePipeline")
            .field("admission", &self.admission)
            .field("health", &self.health)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}
