//! The only writer to the task store.

use std::sync::Arc;

use tracing::{debug, error};

use crate::core::continuation::{Continuation, ContinuationRegistry, FailureInfo};
use crate::core::error::{PipelineError, StoreError};
use crate::core::health::HealthMonitor;
use crate::core::runner::{WakeHandle, WakeReason};
use crate::core::store::TaskStore;
use crate::core::task::{ApiRequest, TaskKind};
use crate::util::serde::TaskId;

/// Turns admitted requests into persisted task records and wakes the runner.
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    health: Arc<HealthMonitor>,
    continuations: Arc<ContinuationRegistry>,
    waker: WakeHandle,
}

impl Scheduler {
    /// Wire a scheduler from its collaborators.
    pub fn new(
        store: Arc<dyn TaskStore>,
        health: Arc<HealthMonitor>,
        continuations: Arc<ContinuationRegistry>,
        waker: WakeHandle,
    ) -> Self {
        Self {
            store,
            health,
            continuations,
            waker,
        }
    }

    /// Persist `request` as an `api_call` task and signal the runner.
    ///
    /// The wake is a hint, not a promise of immediate execution. On failure the
    /// request's failure continuation (if any) is invoked and the event is lost;
    /// nothing is kept in memory for a later attempt.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Serialization` if the request cannot be encoded
    /// - `PipelineError::Store` if the record cannot be persisted; the health
    ///   monitor's breaker is opened first
    pub fn schedule_task(&self, request: ApiRequest) -> Result<TaskId, PipelineError> {
        self.persist(request).map_err(|(err, continuation)| {
            continuation.fail(FailureInfo::new(None, drop_reason(&err)));
            err
        })
    }

    /// Like [`schedule_task`](Self::schedule_task) but hands the continuation of
    /// a failed request back instead of invoking it, so callers holding a lock
    /// can run it after releasing.
    pub(crate) fn persist(&self, request: ApiRequest) -> Result<TaskId, (PipelineError, Continuation)> {
        let ApiRequest { request, continuation } = request;

        let payload = match request.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(resource_path = %request.resource_path, error = %e, "failed to encode request");
                return Err((PipelineError::Serialization(e), continuation));
            }
        };

        let created = self
            .continuations
            .register_with(continuation, || self.store.create(TaskKind::ApiCall, payload));

        match created {
            Ok(task_id) => {
                debug!(task_id = %task_id, resource_path = %request.resource_path, "task scheduled");
                self.waker.wake(WakeReason::TaskCreated);
                Ok(task_id)
            }
            Err((e, continuation)) => {
                self.health.on_storage_error(&e);
                Err((PipelineError::Store(e), continuation))
            }
        }
    }

    /// Persisted records currently pending.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn pending(&self) -> Result<usize, StoreError> {
        self.store.count()
    }
}

/// Reason reported to the failure continuation of a request that could not be scheduled.
pub(crate) fn drop_reason(err: &PipelineError) -> String {
    match err {
        PipelineError::Serialization(e) => format!("failed to encode request: {e}"),
        PipelineError::Store(e) => format!("failed to persist task: {e}"),
        other => other.to_string(),
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}
