//! Push-style signal sources.
//!
//! Hosts forward platform callbacks (reachability changes, activity lifecycle)
//! into these types; they also serve as deterministic signals in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::signal::{
    ConnectivityCallback, ConnectivitySignal, LifecycleCallback, LifecycleEvent, LifecycleSignal,
    SubscriptionId,
};

/// Subscriber list shared by the manual signals.
struct Subscribers<F: ?Sized> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Arc<F>)>>,
}

impl<F: ?Sized> Subscribers<F> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, callback: Arc<F>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push((id, callback));
        id
    }

    fn remove(&self, id: SubscriptionId) {
        self.entries.write().retain(|(sid, _)| *sid != id);
    }

    /// Snapshot so callbacks run without the lock held.
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.read().iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Connectivity signal driven by [`ManualConnectivity::set_connected`].
pub struct ManualConnectivity {
    connected: AtomicBool,
    subscribers: Subscribers<dyn Fn(bool) + Send + Sync>,
}

impl ManualConnectivity {
    /// Create a signal with the given initial state.
    #[must_use]
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            subscribers: Subscribers::new(),
        }
    }

    /// Update reachability; subscribers are notified only on an actual change.
    pub fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::AcqRel);
        if previous == connected {
            return;
        }
        tracing::debug!(connected, "connectivity changed");
        for callback in self.subscribers.snapshot() {
            callback(connected);
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivitySignal for ManualConnectivity {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn subscribe(&self, callback: ConnectivityCallback) -> SubscriptionId {
        self.subscribers.add(Arc::from(callback))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

/// Lifecycle signal driven by [`ManualLifecycle::enter_foreground`] and
/// [`ManualLifecycle::enter_background`].
pub struct ManualLifecycle {
    background: AtomicBool,
    subscribers: Subscribers<dyn Fn(LifecycleEvent) + Send + Sync>,
}

impl ManualLifecycle {
    /// Create a signal that starts in the foreground.
    #[must_use]
    pub fn new() -> Self {
        Self {
            background: AtomicBool::new(false),
            subscribers: Subscribers::new(),
        }
    }

    /// Report a transition to the foreground.
    pub fn enter_foreground(&self) {
        self.transition(LifecycleEvent::Foreground);
    }

    /// Report a transition to the background.
    pub fn enter_background(&self) {
        self.transition(LifecycleEvent::Background);
    }

    fn transition(&self, event: LifecycleEvent) {
        self.background
            .store(event == LifecycleEvent::Background, Ordering::Release);
        for callback in self.subscribers.snapshot() {
            callback(event);
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for ManualLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSignal for ManualLifecycle {
    fn is_in_background(&self) -> bool {
        self.background.load(Ordering::Acquire)
    }

    fn subscribe(&self, callback: LifecycleCallback) -> SubscriptionId {
        self.subscribers.add(Arc::from(callback))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}
