//! Admission filter: deferrable or immediate, admitted or dropped.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::continuation::FailureInfo;
use crate::core::dispatcher::ImmediateDispatcher;
use crate::core::health::HealthMonitor;
use crate::core::scheduler::{drop_reason, Scheduler};
use crate::core::task::ApiRequest;
use crate::util::serde::TaskId;

/// Tracking endpoints that are safe to delay and replay.
pub const DEFAULT_DEFERRABLE_ENDPOINTS: &[&str] = &[
    "events/track",
    "events/trackPurchase",
    "events/trackInAppOpen",
    "events/trackInAppClick",
    "events/trackInAppClose",
    "events/trackInAppDelivery",
    "events/inAppConsume",
    "embedded-messaging/events/received",
    "embedded-messaging/events/click",
    "embedded-messaging/events/impression",
    "embedded-messaging/events/session",
];

/// Result of [`AdmissionFilter::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Handed to the immediate dispatcher.
    SentImmediately,
    /// Persisted as the given task.
    Deferred(TaskId),
    /// Discarded: queue full, store failure, or pipeline shut down.
    Dropped,
}

/// Allow-list of deferrable resource paths. Matching is exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPolicy {
    deferrable: HashSet<String>,
}

impl EndpointPolicy {
    /// Build a policy from explicit paths.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deferrable: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `resource_path` may go through the durable queue.
    #[must_use]
    pub fn is_deferrable(&self, resource_path: &str) -> bool {
        self.deferrable.contains(resource_path)
    }

    /// Number of deferrable paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deferrable.len()
    }

    /// True when nothing is deferrable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deferrable.is_empty()
    }
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEFERRABLE_ENDPOINTS.iter().copied())
    }
}

/// Routes requests to the immediate dispatcher or the scheduler.
///
/// Holds no state of its own besides the admission lock, which makes the
/// capacity check and the store write one step so concurrent producers cannot
/// push the queue past its limit.
pub struct AdmissionFilter {
    policy: EndpointPolicy,
    offline_mode_enabled: bool,
    health: Arc<HealthMonitor>,
    scheduler: Scheduler,
    dispatcher: Arc<ImmediateDispatcher>,
    admission: Mutex<()>,
}

impl AdmissionFilter {
    /// Wire a filter. With `offline_mode_enabled == false` every request is sent immediately.
    pub fn new(
        policy: EndpointPolicy,
        offline_mode_enabled: bool,
        health: Arc<HealthMonitor>,
        scheduler: Scheduler,
        dispatcher: Arc<ImmediateDispatcher>,
    ) -> Self {
        Self {
            policy,
            offline_mode_enabled,
            health,
            scheduler,
            dispatcher,
            admission: Mutex::new(()),
        }
    }

    /// Classify and route `request`. Never waits on the network.
    ///
    /// A dropped request's failure continuation is invoked with the reason.
    pub fn submit(&self, request: ApiRequest) -> Outcome {
        if !self.offline_mode_enabled || !self.policy.is_deferrable(request.resource_path()) {
            return self.send_now(request);
        }

        // Continuations run after the lock is released; they may call `submit` again.
        let (reason, continuation) = {
            let _admission = self.admission.lock();
            if self.health.can_schedule() {
                match self.scheduler.persist(request) {
                    Ok(task_id) => return Outcome::Deferred(task_id),
                    Err((e, continuation)) => {
                        warn!(error = %e, "failed to schedule task, dropping event");
                        (drop_reason(&e), continuation)
                    }
                }
            } else {
                warn!(
                    resource_path = request.resource_path(),
                    max = self.health.max_queue_size(),
                    "offline queue full, dropping event"
                );
                ("offline queue full".to_string(), request.continuation)
            }
        };
        continuation.fail(FailureInfo::new(None, reason));
        Outcome::Dropped
    }

    /// Whether `resource_path` would be deferred under the current settings.
    #[must_use]
    pub fn is_deferrable(&self, resource_path: &str) -> bool {
        self.offline_mode_enabled && self.policy.is_deferrable(resource_path)
    }

    fn send_now(&self, request: ApiRequest) -> Outcome {
        debug!(resource_path = request.resource_path(), "routing to immediate path");
        match self.dispatcher.dispatch(request) {
            Ok(()) => Outcome::SentImmediately,
            Err(_) => Outcome::Dropped,
        }
    }
}

impl std::fmt::Debug for AdmissionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionFilter")
            .field("offline_mode_enabled", &self.offline_mode_enabled)
            .field("deferrable_endpoints", &self.policy.len())
            .finish_non_exhaustive()
    }
}
