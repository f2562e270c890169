//! Runner thread tests: wake handling, retry timer, diagnostics and shutdown.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{FlakyStore, MockTransport, IDLE_TIMEOUT};
use offline_pipeline::core::{
    wake_channel, ApiRequest, ContinuationRegistry, HealthMonitor, ListenerRegistry, Runner, RunnerOptions,
    TaskKind, TaskProcessor, TaskStore, TransportError, WakeReason,
};
use offline_pipeline::infra::{InMemoryTaskStore, ManualConnectivity, ManualLifecycle};

// ============================================================================
// HELPERS
// ============================================================================

struct Harness {
    store: Arc<dyn TaskStore>,
    health: Arc<HealthMonitor>,
    transport: Arc<MockTransport>,
    net: Arc<ManualConnectivity>,
    lifecycle: Arc<ManualLifecycle>,
    runner: Runner,
}

fn start(store: Arc<dyn TaskStore>, connected: bool, retry_interval: Option<Duration>) -> Harness {
    let health = Arc::new(HealthMonitor::new(Arc::clone(&store), 100));
    let transport = MockTransport::new();
    let net = Arc::new(ManualConnectivity::new(connected));
    let lifecycle = Arc::new(ManualLifecycle::new());
    let processor = Arc::new(TaskProcessor::new(
        Arc::clone(&store),
        Arc::clone(&health),
        transport.clone(),
        net.clone(),
        Arc::new(ContinuationRegistry::new()),
        Arc::new(ListenerRegistry::new()),
    ));
    let runner = Runner::start(
        processor,
        wake_channel(),
        net.clone(),
        Some(lifecycle.clone()),
        RunnerOptions { retry_interval },
    )
    .unwrap();
    Harness {
        store,
        health,
        transport,
        net,
        lifecycle,
        runner,
    }
}

fn enqueue(store: &dyn TaskStore, n: u32) -> String {
    let request = ApiRequest::post("api-key", "events/track").with_field("n", n);
    store
        .create(TaskKind::ApiCall, request.request.to_payload().unwrap())
        .unwrap()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_startup_drains_tasks_left_by_previous_process() {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    enqueue(store.as_ref(), 1);
    enqueue(store.as_ref(), 2);

    let h = start(store, true, None);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    assert_eq!(h.transport.field("n"), vec!["1", "2"]);
    assert_eq!(h.store.count().unwrap(), 0);
    assert_eq!(h.runner.diagnostics().tasks_resolved, 2);
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_no_work_while_offline_then_resumes_on_connectivity() {
    let h = start(Arc::new(InMemoryTaskStore::new()), false, None);
    enqueue(h.store.as_ref(), 1);
    h.runner.wake(WakeReason::TaskCreated);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    assert!(h.transport.calls().is_empty());

    h.net.set_connected(true);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    assert_eq!(h.transport.calls().len(), 1);
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_foreground_wakes_runner() {
    let h = start(Arc::new(InMemoryTaskStore::new()), true, None);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    enqueue(h.store.as_ref(), 1);

    h.lifecycle.enter_foreground();
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    assert_eq!(h.transport.calls().len(), 1);
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_burst_of_wakes_is_coalesced() {
    let h = start(Arc::new(InMemoryTaskStore::new()), true, None);
    h.transport.set_delay(Duration::from_millis(50));
    enqueue(h.store.as_ref(), 1);
    h.runner.wake(WakeReason::TaskCreated);
    // Posted while the first cycle is busy on the network.
    std::thread::sleep(Duration::from_millis(10));
    for _ in 0..20 {
        h.runner.wake(WakeReason::Manual);
    }
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));

    let cycles = h.runner.diagnostics().cycles_completed;
    assert!(cycles < 10, "expected coalesced cycles, got {cycles}");
    assert_eq!(h.transport.calls().len(), 1);
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_retry_timer_retries_head_without_external_signal() {
    let h = start(
        Arc::new(InMemoryTaskStore::new()),
        false,
        Some(Duration::from_millis(50)),
    );
    let a = enqueue(h.store.as_ref(), 1);
    enqueue(h.store.as_ref(), 2);
    h.transport.push_result(Err(TransportError::retryable("connection reset")));

    h.net.set_connected(true);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    assert_eq!(h.runner.diagnostics().retry_pending, Some(a));

    assert!(wait_until(IDLE_TIMEOUT, || h.transport.calls().len() == 3));
    assert_eq!(h.transport.field("n"), vec!["1", "1", "2"]);
    assert!(wait_until(IDLE_TIMEOUT, || h.runner.diagnostics().retry_pending.is_none()));
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_auth_refresh_keeps_task() {
    let h = start(Arc::new(InMemoryTaskStore::new()), false, None);
    let a = enqueue(h.store.as_ref(), 1);
    h.transport.push_result(Err(TransportError::AuthRefresh {
        reason: "token expired".into(),
    }));

    h.net.set_connected(true);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
    assert_eq!(h.store.all_ids().unwrap(), vec![a]);
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_delete_failure_opens_breaker_and_stops_cycle() {
    let store = FlakyStore::new();
    store.fail_delete(true);
    let h = start(store.clone(), false, None);
    enqueue(h.store.as_ref(), 1);
    enqueue(h.store.as_ref(), 2);

    h.net.set_connected(true);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));

    // Delivered once, never followed by the next task.
    assert_eq!(h.transport.field("n"), vec!["1"]);
    assert!(!h.health.can_process());
    assert_eq!(h.store.count().unwrap(), 2);
    h.runner.shutdown(IDLE_TIMEOUT);
}

#[test]
fn test_shutdown_is_idempotent_and_unsubscribes() {
    let h = start(Arc::new(InMemoryTaskStore::new()), true, None);
    assert_eq!(h.net.subscriber_count(), 1);
    assert_eq!(h.lifecycle.subscriber_count(), 1);

    h.runner.shutdown(IDLE_TIMEOUT);
    h.runner.shutdown(IDLE_TIMEOUT);

    assert_eq!(h.net.subscriber_count(), 0);
    assert_eq!(h.lifecycle.subscriber_count(), 0);
    assert!(!h.runner.diagnostics().running);
    // Wakes after shutdown are ignored.
    h.runner.wake(WakeReason::Manual);
    assert!(h.runner.wait_for_idle(IDLE_TIMEOUT));
}

#[test]
fn test_drop_without_shutdown_does_not_block() {
    let h = start(Arc::new(InMemoryTaskStore::new()), true, None);
    let started = Instant::now();
    drop(h);
    assert!(started.elapsed() < Duration::from_secs(1));
}
