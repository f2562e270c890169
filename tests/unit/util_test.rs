//! Tests for shared utilities

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use offline_pipeline::util::{init_tracing, new_task_id, now_ms, ActivityTracker};

#[test]
fn test_now_ms_is_after_2020() {
    assert!(now_ms() > 1_577_836_800_000);
}

#[test]
fn test_task_ids_are_unique_uuids() {
    let a = new_task_id();
    let b = new_task_id();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
    assert!(uuid::Uuid::parse_str(&a).is_ok());
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized");
}

#[test]
fn test_activity_tracker_wakes_waiter_when_worker_finishes() {
    let tracker = Arc::new(ActivityTracker::new());
    tracker.posted();
    tracker.posted();
    assert!(!tracker.is_idle());

    let worker = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tracker.begin(2);
            thread::sleep(Duration::from_millis(20));
            tracker.end();
        })
    };
    assert!(tracker.wait_for_idle(Duration::from_secs(5)));
    worker.join().unwrap();
}

#[test]
fn test_activity_tracker_times_out_when_busy() {
    let tracker = ActivityTracker::new();
    tracker.begin(0);
    assert!(!tracker.wait_for_idle(Duration::from_millis(20)));
    tracker.end();
    assert!(tracker.wait_for_idle(Duration::from_millis(20)));
}
