//! The single consumer: a dedicated thread draining the task store.
//!
//! # Design
//!
//! - **No polling**: the thread blocks on a `crossbeam-channel` receiver and only
//!   runs a drain cycle when woken (task created, connectivity regained, app
//!   foregrounded, retry timer, manual wake)
//! - **Coalescing**: a burst of wake messages yields a single drain cycle
//! - **Signals as messages**: connectivity/lifecycle callbacks never touch the store;
//!   they post a message and return
//! - **Clean shutdown**: a shutdown message ends the loop; `Drop` signals without
//!   joining

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::PipelineError;
use crate::core::processor::{CycleOutcome, GateBlock, TaskProcessor};
use crate::core::signal::{ConnectivitySignal, LifecycleEvent, LifecycleSignal, SubscriptionId};
use crate::util::activity::ActivityTracker;
use crate::util::serde::TaskId;

/// Why the runner was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeReason {
    /// Runner started; tasks may be left from a previous process.
    Startup,
    /// The scheduler persisted a new task.
    TaskCreated,
    /// The device went back online.
    ConnectivityRegained,
    /// The host app came to the foreground.
    Foreground,
    /// The retry interval after a retryable failure elapsed.
    RetryTimer,
    /// Host asked for a drain explicitly.
    Manual,
}

enum RunnerMessage {
    Wake(WakeReason),
    Shutdown,
}

/// Cloneable handle that posts wake-ups to the runner thread.
#[derive(Clone)]
pub struct WakeHandle {
    tx: Sender<RunnerMessage>,
    activity: Arc<ActivityTracker>,
}

impl WakeHandle {
    /// Ask the runner for a drain cycle. Never blocks.
    pub fn wake(&self, reason: WakeReason) {
        self.activity.posted();
        if self.tx.send(RunnerMessage::Wake(reason)).is_err() {
            self.activity.unposted();
            debug!(?reason, "runner gone, wake dropped");
        }
    }

    fn shutdown(&self) -> bool {
        self.activity.posted();
        if self.tx.send(RunnerMessage::Shutdown).is_err() {
            self.activity.unposted();
            return false;
        }
        true
    }
}

impl std::fmt::Debug for WakeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeHandle").finish_non_exhaustive()
    }
}

/// Receiving half of the runner channel, consumed by [`Runner::start`].
pub struct WakeReceiver {
    rx: Receiver<RunnerMessage>,
    activity: Arc<ActivityTracker>,
}

/// Create the runner's wake channel.
///
/// The handle can be given to producers (the scheduler) before the runner starts;
/// wakes posted early are processed once it does.
#[must_use]
pub fn wake_channel() -> (WakeHandle, WakeReceiver) {
    let (tx, rx) = unbounded();
    let activity = Arc::new(ActivityTracker::new());
    (
        WakeHandle {
            tx,
            activity: Arc::clone(&activity),
        },
        WakeReceiver { rx, activity },
    )
}

/// Snapshot of the runner's transient state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerDiagnostics {
    /// Task being executed right now.
    pub in_flight: Option<TaskId>,
    /// Gate that stopped the most recent cycle, if one did.
    pub last_block: Option<GateBlock>,
    /// Task waiting to be retried at the head of the queue.
    pub retry_pending: Option<TaskId>,
    /// Host app is backgrounded. Informational only; processing continues.
    pub app_in_background: bool,
    /// Drain cycles run so far.
    pub cycles_completed: u64,
    /// Tasks resolved (success or permanent failure) so far.
    pub tasks_resolved: u64,
    /// Worker thread is alive.
    pub running: bool,
}

/// Runner tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerOptions {
    /// Self-wake this long after a retryable failure. `None` waits for an external signal.
    pub retry_interval: Option<Duration>,
}

/// Handle to the runner thread.
pub struct Runner {
    wake: WakeHandle,
    activity: Arc<ActivityTracker>,
    processor: Arc<TaskProcessor>,
    status: Arc<Mutex<RunnerDiagnostics>>,
    shutdown: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    connectivity: Arc<dyn ConnectivitySignal>,
    connectivity_sub: SubscriptionId,
    lifecycle: Option<(Arc<dyn LifecycleSignal>, SubscriptionId)>,
}

impl Runner {
    /// Subscribe to the signals and spawn the runner thread.
    ///
    /// An initial [`WakeReason::Startup`] is posted so records persisted by a
    /// previous process are picked up.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Thread` if the OS refuses to spawn the thread.
    pub fn start(
        processor: Arc<TaskProcessor>,
        (wake, receiver): (WakeHandle, WakeReceiver),
        connectivity: Arc<dyn ConnectivitySignal>,
        lifecycle: Option<Arc<dyn LifecycleSignal>>,
        options: RunnerOptions,
    ) -> Result<Self, PipelineError> {
        let status = Arc::new(Mutex::new(RunnerDiagnostics {
            app_in_background: lifecycle.as_ref().is_some_and(|l| l.is_in_background()),
            running: true,
            ..RunnerDiagnostics::default()
        }));
        let activity = Arc::clone(&receiver.activity);

        let worker = {
            let processor = Arc::clone(&processor);
            let status = Arc::clone(&status);
            thread::Builder::new()
                .name("offline-runner".into())
                .spawn(move || run_loop(&processor, &receiver, &status, options))
                .map_err(PipelineError::Thread)?
        };

        let connectivity_sub = {
            let wake = wake.clone();
            connectivity.subscribe(Box::new(move |connected: bool| {
                if connected {
                    wake.wake(WakeReason::ConnectivityRegained);
                }
            }))
        };

        let lifecycle = lifecycle.map(|signal| {
            let wake = wake.clone();
            let status = Arc::clone(&status);
            let id = signal.subscribe(Box::new(move |event: LifecycleEvent| {
                status.lock().app_in_background = event == LifecycleEvent::Background;
                if event == LifecycleEvent::Foreground {
                    wake.wake(WakeReason::Foreground);
                }
            }));
            (signal, id)
        });

        wake.wake(WakeReason::Startup);
        info!("offline runner started");

        Ok(Self {
            wake,
            activity,
            processor,
            status,
            shutdown: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
            connectivity,
            connectivity_sub,
            lifecycle,
        })
    }

    /// Post a wake-up.
    pub fn wake(&self, reason: WakeReason) {
        self.wake.wake(reason);
    }

    /// Handle producers use to wake this runner.
    #[must_use]
    pub fn wake_handle(&self) -> WakeHandle {
        self.wake.clone()
    }

    /// Current transient state.
    #[must_use]
    pub fn diagnostics(&self) -> RunnerDiagnostics {
        let mut diagnostics = self.status.lock().clone();
        diagnostics.in_flight = self.processor.in_flight();
        diagnostics
    }

    /// Block until every posted wake has been processed and no cycle is running.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        self.activity.wait_for_idle(timeout)
    }

    /// Stop the runner and join its thread (up to `join_timeout`). Idempotent.
    ///
    /// A task already executing finishes its transport call first; it is never
    /// half-resolved.
    pub fn shutdown(&self, join_timeout: Duration) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("shutting down offline runner");
        self.unsubscribe();
        self.wake.shutdown();

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let (tx, rx) = crossbeam_channel::bounded(1);
        let joiner = thread::spawn(move || {
            let _ = tx.send(worker.join().is_ok());
        });
        match rx.recv_timeout(join_timeout) {
            Ok(true) => debug!("runner joined"),
            Ok(false) => warn!("runner thread panicked"),
            Err(_) => warn!("runner did not exit within timeout, detaching"),
        }
        drop(joiner);
    }

    fn unsubscribe(&self) {
        self.connectivity.unsubscribe(self.connectivity_sub);
        if let Some((signal, id)) = &self.lifecycle {
            signal.unsubscribe(*id);
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        // Signal only; joining here could hang on an in-flight network call.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.unsubscribe();
            self.wake.shutdown();
            debug!("runner dropped without explicit shutdown, thread detached");
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("diagnostics", &self.diagnostics())
            .finish_non_exhaustive()
    }
}

fn run_loop(
    processor: &TaskProcessor,
    receiver: &WakeReceiver,
    status: &Mutex<RunnerDiagnostics>,
    options: RunnerOptions,
) {
    debug!("runner thread started");
    let rx = &receiver.rx;
    let activity = &receiver.activity;
    let mut retry_at: Option<Instant> = None;

    loop {
        let first = match retry_at {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        let mut consumed = 0;
        let mut stop = false;
        let mut reasons = Vec::new();
        match first {
            Some(RunnerMessage::Wake(reason)) => {
                consumed += 1;
                reasons.push(reason);
            }
            Some(RunnerMessage::Shutdown) => {
                consumed += 1;
                stop = true;
            }
            None => reasons.push(WakeReason::RetryTimer),
        }
        while let Ok(msg) = rx.try_recv() {
            consumed += 1;
            match msg {
                RunnerMessage::Wake(reason) => reasons.push(reason),
                RunnerMessage::Shutdown => stop = true,
            }
        }

        activity.begin(consumed);
        if stop {
            activity.end();
            break;
        }

        debug!(?reasons, "drain cycle starting");
        let outcome = processor.drain();

        retry_at = None;
        {
            let mut status = status.lock();
            status.cycles_completed += 1;
            status.last_block = None;
            status.retry_pending = None;
            let processed = match &outcome {
                CycleOutcome::Drained { processed } | CycleOutcome::StorageFault { processed } => *processed,
                CycleOutcome::Blocked { gate, processed } => {
                    status.last_block = Some(*gate);
                    *processed
                }
                CycleOutcome::RetryPending { task_id, processed } => {
                    status.retry_pending = Some(task_id.clone());
                    retry_at = options.retry_interval.map(|d| Instant::now() + d);
                    *processed
                }
            };
            status.tasks_resolved += processed as u64;
        }
        activity.end();
    }

    status.lock().running = false;
    activity.reset();
    debug!("runner thread exiting");
}
