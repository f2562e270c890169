//! Immediate path: non-deferrable requests sent off the caller's thread.
//!
//! A single `offline-dispatch` thread consumes requests from a `crossbeam-channel`
//! and runs them against the transport in submission order. Only the request's
//! own continuations are invoked; completion listeners observe deferred tasks only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::continuation::FailureInfo;
use crate::core::error::PipelineError;
use crate::core::task::ApiRequest;
use crate::core::transport::Transport;
use crate::util::activity::ActivityTracker;

enum DispatchMessage {
    Send(ApiRequest),
    Shutdown,
}

/// Sends requests immediately on a dedicated thread.
pub struct ImmediateDispatcher {
    tx: Sender<DispatchMessage>,
    activity: Arc<ActivityTracker>,
    shutdown: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ImmediateDispatcher {
    /// Spawn the dispatcher thread.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Thread` if the thread cannot be spawned.
    pub fn start(transport: Arc<dyn Transport>) -> Result<Self, PipelineError> {
        let (tx, rx) = unbounded();
        let activity = Arc::new(ActivityTracker::new());
        let worker = {
            let activity = Arc::clone(&activity);
            thread::Builder::new()
                .name("offline-dispatch".into())
                .spawn(move || dispatch_loop(transport.as_ref(), &rx, &activity))
                .map_err(PipelineError::Thread)?
        };
        Ok(Self {
            tx,
            activity,
            shutdown: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue `request` for sending. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Shutdown` after [`shutdown`](Self::shutdown); the
    /// request's failure continuation is invoked before returning.
    pub fn dispatch(&self, request: ApiRequest) -> Result<(), PipelineError> {
        if self.shutdown.load(Ordering::Acquire) {
            request
                .continuation
                .fail(FailureInfo::new(None, "pipeline has been shut down"));
            return Err(PipelineError::Shutdown);
        }
        self.activity.posted();
        if let Err(err) = self.tx.send(DispatchMessage::Send(request)) {
            self.activity.unposted();
            if let DispatchMessage::Send(request) = err.into_inner() {
                request
                    .continuation
                    .fail(FailureInfo::new(None, "pipeline has been shut down"));
            }
            return Err(PipelineError::Shutdown);
        }
        Ok(())
    }

    /// Block until every queued request has been sent, or `timeout` elapses.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        self.activity.wait_for_idle(timeout)
    }

    /// Stop after the requests already queued and join the thread. Idempotent.
    pub fn shutdown(&self, join_timeout: Duration) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(DispatchMessage::Shutdown);
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(worker.join().is_ok());
        });
        match rx.recv_timeout(join_timeout) {
            Ok(true) => debug!("dispatcher joined"),
            Ok(false) => warn!("dispatcher thread panicked"),
            Err(_) => warn!("dispatcher did not exit within timeout, detaching"),
        }
    }
}

impl Drop for ImmediateDispatcher {
    fn drop(&mut self) {
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(DispatchMessage::Shutdown);
        }
    }
}

impl std::fmt::Debug for ImmediateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmediateDispatcher")
            .field("idle", &self.activity.is_idle())
            .finish_non_exhaustive()
    }
}

fn dispatch_loop(transport: &dyn Transport, rx: &Receiver<DispatchMessage>, activity: &ActivityTracker) {
    info!("immediate dispatcher started");
    while let Ok(msg) = rx.recv() {
        let DispatchMessage::Send(request) = msg else {
            break;
        };
        activity.begin(1);

        let ApiRequest { request, continuation } = request;
        debug!(resource_path = %request.resource_path, method = %request.method, "sending immediately");
        match transport.execute(&request) {
            Ok(body) => continuation.succeed(body),
            Err(err) => {
                warn!(resource_path = %request.resource_path, error = %err, "immediate request failed");
                continuation.fail(FailureInfo::from_transport(None, &err));
            }
        }
        activity.end();
    }
    // Requests that raced with shutdown are never sent.
    while let Ok(msg) = rx.try_recv() {
        if let DispatchMessage::Send(request) = msg {
            request
                .continuation
                .fail(FailureInfo::new(None, "pipeline has been shut down"));
        }
    }
    activity.reset();
    info!("immediate dispatcher stopped");
}
