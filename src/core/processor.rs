//! One drain cycle: check gates, fetch the oldest task, execute, resolve, repeat.
//!
//! Runs on the runner thread only. A retryable failure or a storage fault ends
//! the cycle without touching the next record, so nothing is ever delivered
//! ahead of a failed predecessor.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::continuation::{ContinuationRegistry, FailureInfo};
use crate::core::error::TransportError;
use crate::core::health::HealthMonitor;
use crate::core::listener::{ListenerRegistry, TaskOutcome};
use crate::core::signal::ConnectivitySignal;
use crate::core::store::TaskStore;
use crate::core::task::{SerializedRequest, TaskKind, TaskRecord};
use crate::core::transport::Transport;
use crate::util::serde::{ResponseBody, TaskId};

/// Gate that stopped a drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBlock {
    /// The health monitor's breaker is open.
    StorageUnhealthy,
    /// The device reports no network.
    Offline,
}

/// How a drain cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The store is empty.
    Drained {
        /// Tasks resolved in this cycle.
        processed: usize,
    },
    /// A gate closed before or between tasks.
    Blocked {
        /// The closed gate.
        gate: GateBlock,
        /// Tasks resolved before the gate closed.
        processed: usize,
    },
    /// The head task failed retryably and stays at the head of the queue.
    RetryPending {
        /// The task that will be retried first.
        task_id: TaskId,
        /// Tasks resolved before the failure.
        processed: usize,
    },
    /// The store failed; the breaker is now open.
    StorageFault {
        /// Tasks resolved before the fault.
        processed: usize,
    },
}

enum Resolution {
    Delivered(ResponseBody),
    Retry(TransportError),
    Rejected(FailureInfo),
}

enum Step {
    Resolved,
    Retry,
    StorageFault,
}

/// Executes queued tasks against the transport and resolves their outcome.
pub struct TaskProcessor {
    store: Arc<dyn TaskStore>,
    health: Arc<HealthMonitor>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn ConnectivitySignal>,
    continuations: Arc<ContinuationRegistry>,
    listeners: Arc<ListenerRegistry>,
    in_flight: Mutex<Option<TaskId>>,
}

impl TaskProcessor {
    /// Wire a processor from its collaborators.
    pub fn new(
        store: Arc<dyn TaskStore>,
        health: Arc<HealthMonitor>,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn ConnectivitySignal>,
        continuations: Arc<ContinuationRegistry>,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            store,
            health,
            transport,
            connectivity,
            continuations,
            listeners,
            in_flight: Mutex::new(None),
        }
    }

    /// Task currently being executed, if any. Transient; never persisted.
    pub fn in_flight(&self) -> Option<TaskId> {
        self.in_flight.lock().clone()
    }

    /// First closed gate, if any. Lifecycle state is deliberately not a gate.
    pub fn check_gates(&self) -> Option<GateBlock> {
        if !self.health.can_process() {
            return Some(GateBlock::StorageUnhealthy);
        }
        if !self.connectivity.is_connected() {
            return Some(GateBlock::Offline);
        }
        None
    }

    /// Run one drain cycle.
    pub fn drain(&self) -> CycleOutcome {
        let mut processed = 0;
        loop {
            if let Some(gate) = self.check_gates() {
                debug!(?gate, processed, "drain cycle blocked");
                return CycleOutcome::Blocked { gate, processed };
            }

            let record = match self.store.next_pending() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!(processed, "task queue drained");
                    return CycleOutcome::Drained { processed };
                }
                Err(e) => {
                    self.health.on_storage_error(&e);
                    return CycleOutcome::StorageFault { processed };
                }
            };

            let task_id = record.id.clone();
            *self.in_flight.lock() = Some(task_id.clone());
            let step = self.process(record);
            *self.in_flight.lock() = None;

            match step {
                Step::Resolved => processed += 1,
                Step::Retry => return CycleOutcome::RetryPending { task_id, processed },
                Step::StorageFault => return CycleOutcome::StorageFault { processed },
            }
        }
    }

    fn process(&self, record: TaskRecord) -> Step {
        let resolution = self.execute(&record);
        let task_id = record.id;

        match resolution {
            Resolution::Delivered(body) => {
                debug!(task_id = %task_id, "task delivered");
                let deleted = self.delete(&task_id);
                if let Some(continuation) = self.continuations.take(&task_id) {
                    continuation.succeed(body.clone());
                }
                self.listeners.notify(&task_id, TaskOutcome::Success, Some(&body));
                if deleted {
                    Step::Resolved
                } else {
                    Step::StorageFault
                }
            }
            Resolution::Retry(err) => {
                warn!(task_id = %task_id, error = %err, "task failed, will retry");
                Step::Retry
            }
            Resolution::Rejected(info) => {
                warn!(task_id = %task_id, reason = %info.reason, "task rejected, dropping");
                let deleted = self.delete(&task_id);
                let body = info.body.clone();
                match self.continuations.take(&task_id) {
                    Some(continuation) => continuation.fail(info),
                    None => info!(task_id = %task_id, "no in-process continuation for failed task"),
                }
                self.listeners.notify(&task_id, TaskOutcome::Failure, body.as_ref());
                if deleted {
                    Step::Resolved
                } else {
                    Step::StorageFault
                }
            }
        }
    }

    fn execute(&self, record: &TaskRecord) -> Resolution {
        match record.kind {
            TaskKind::ApiCall => {
                let request = match SerializedRequest::from_payload(&record.payload) {
                    Ok(request) => request,
                    Err(e) => {
                        error!(task_id = %record.id, error = %e, "undecodable task payload");
                        return Resolution::Rejected(FailureInfo::new(
                            Some(record.id.clone()),
                            format!("undecodable task payload: {e}"),
                        ));
                    }
                };
                debug!(
                    task_id = %record.id,
                    method = %request.method,
                    resource_path = %request.resource_path,
                    "executing task"
                );
                match self.transport.execute(&request) {
                    Ok(body) => Resolution::Delivered(body),
                    Err(err) if err.is_retryable() => Resolution::Retry(err),
                    Err(err) => Resolution::Rejected(FailureInfo::from_transport(Some(record.id.clone()), &err)),
                }
            }
        }
    }

    fn delete(&self, task_id: &str) -> bool {
        match self.store.delete(task_id) {
            Ok(()) => true,
            Err(e) => {
                self.health.on_storage_error(&e);
                false
            }
        }
    }
}

impl std::fmt::Debug for TaskProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskProcessor")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
