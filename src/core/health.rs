//! Storage health and queue-size gates.
//!
//! Two independent gates:
//! - admission: `count < max_queue_size`, bounding disk growth while offline
//! - processing: no storage fault recorded in this process (circuit breaker)
//!
//! The breaker never closes on its own. A fresh process, or an explicit
//! [`HealthMonitor::reset`], is the only way back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::core::error::StoreError;
use crate::core::store::TaskStore;

/// Point-in-time view of the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// False once a storage fault has been recorded.
    pub storage_healthy: bool,
    /// Pending records, if the store could be read.
    pub queue_len: Option<usize>,
    /// Admission limit.
    pub max_queue_size: usize,
    /// Storage faults observed since start (or last reset).
    pub storage_errors: u64,
}

/// Gates admission and processing on store health.
pub struct HealthMonitor {
    store: Arc<dyn TaskStore>,
    max_queue_size: usize,
    storage_healthy: AtomicBool,
    storage_errors: AtomicU64,
}

impl HealthMonitor {
    /// Create a healthy monitor over `store`.
    pub fn new(store: Arc<dyn TaskStore>, max_queue_size: usize) -> Self {
        Self {
            store,
            max_queue_size,
            storage_healthy: AtomicBool::new(true),
            storage_errors: AtomicU64::new(0),
        }
    }

    /// Admission gate: true iff the store holds fewer than `max_queue_size` records.
    ///
    /// This is the one gate read with a side effect: a failure to read the count
    /// is recorded as a storage fault (opening the processing breaker, same as
    /// [`on_storage_error`](Self::on_storage_error)) and denies admission.
    pub fn can_schedule(&self) -> bool {
        match self.store.count() {
            Ok(len) if len < self.max_queue_size => true,
            Ok(len) => {
                warn!(queue_len = len, max = self.max_queue_size, "task queue full");
                false
            }
            Err(e) => {
                self.on_storage_error(&e);
                false
            }
        }
    }

    /// Processing gate: true iff no storage fault has been recorded.
    pub fn can_process(&self) -> bool {
        self.storage_healthy.load(Ordering::Acquire)
    }

    /// Record a storage fault and open the breaker for the rest of the process.
    pub fn on_storage_error(&self, err: &StoreError) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
        if self.storage_healthy.swap(false, Ordering::AcqRel) {
            error!(error = %err, "task storage failed; offline processing suspended");
        } else {
            warn!(error = %err, "task storage failed again");
        }
    }

    /// Close the breaker again. Intended for hosts that re-open their storage.
    pub fn reset(&self) {
        self.storage_errors.store(0, Ordering::Relaxed);
        self.storage_healthy.store(true, Ordering::Release);
    }

    /// Admission limit.
    #[must_use]
    pub const fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Current view of both gates.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            storage_healthy: self.can_process(),
            queue_len: self.store.count().ok(),
            max_queue_size: self.max_queue_size,
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("max_queue_size", &self.max_queue_size)
            .field("storage_healthy", &self.can_process())
            .finish_non_exhaustive()
    }
}
