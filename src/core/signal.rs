//! Host signal interfaces: network reachability and app lifecycle.
//!
//! The pipeline only subscribes; callbacks must be cheap and non-blocking since
//! they run on whatever thread the host delivers platform events on. The runner
//! turns each callback into a message on its own channel.

/// Handle returned by `subscribe`, used to unsubscribe.
pub type SubscriptionId = u64;

/// Connectivity change callback; receives the new reachability state.
pub type ConnectivityCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Lifecycle change callback.
pub type LifecycleCallback = Box<dyn Fn(LifecycleEvent) + Send + Sync>;

/// Host application lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// App moved to the foreground.
    Foreground,
    /// App moved to the background.
    Background,
}

/// Device network reachability source.
pub trait ConnectivitySignal: Send + Sync {
    /// Current reachability.
    fn is_connected(&self) -> bool;
    /// Register for reachability changes.
    fn subscribe(&self, callback: ConnectivityCallback) -> SubscriptionId;
    /// Remove a registration; unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Host application foreground/background source.
///
/// Lifecycle never gates processing; transitions only wake the runner and feed
/// diagnostics.
pub trait LifecycleSignal: Send + Sync {
    /// Whether the host app is currently backgrounded.
    fn is_in_background(&self) -> bool;
    /// Register for lifecycle transitions.
    fn subscribe(&self, callback: LifecycleCallback) -> SubscriptionId;
    /// Remove a registration; unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
