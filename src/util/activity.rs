//! Idle tracking for background worker threads.
//!
//! Producers call [`ActivityTracker::posted`] for every message they push to a
//! worker; the worker brackets its processing with [`ActivityTracker::begin`] and
//! [`ActivityTracker::end`]. Waiters block on a `Condvar` until nothing is queued
//! and nothing is running. No polling.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct ActivityState {
    /// Messages posted but not yet picked up by the worker.
    pending: usize,
    /// Worker is currently processing.
    busy: bool,
}

/// Tracks whether a worker has outstanding or in-progress work.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    state: Mutex<ActivityState>,
    idle: Condvar,
}

impl ActivityTracker {
    /// Create an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message posted to the worker.
    pub fn posted(&self) {
        self.state.lock().pending += 1;
    }

    /// Undo [`posted`](Self::posted) when the message could not be delivered.
    pub fn unposted(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        self.notify_if_idle(&state);
    }

    /// Worker picked up `consumed` messages and starts processing them.
    pub fn begin(&self, consumed: usize) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(consumed);
        state.busy = true;
    }

    /// Worker finished processing.
    pub fn end(&self) {
        let mut state = self.state.lock();
        state.busy = false;
        self.notify_if_idle(&state);
    }

    /// Forget everything outstanding (worker is gone).
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pending = 0;
        state.busy = false;
        self.idle.notify_all();
    }

    /// True when nothing is queued or running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.pending == 0 && !state.busy
    }

    /// Block until idle or until `timeout` elapses. Returns whether idle was reached.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.pending > 0 || state.busy {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.pending == 0 && !state.busy;
            }
        }
        true
    }

    fn notify_if_idle(&self, state: &ActivityState) {
        if state.pending == 0 && !state.busy {
            self.idle.notify_all();
        }
    }
}
