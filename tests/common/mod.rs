//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use offline_pipeline::core::{
    SerializedRequest, StoreError, TaskKind, TaskRecord, TaskStore, Transport, TransportError,
};
use offline_pipeline::infra::InMemoryTaskStore;
use offline_pipeline::util::{ResponseBody, TaskId};
use parking_lot::Mutex;

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// One transport invocation as observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct Call {
    pub resource_path: String,
    pub body: serde_json::Map<String, serde_json::Value>,
    pub auth_token: Option<String>,
}

/// Transport that records every call and replays scripted results.
///
/// Unscripted calls succeed with `{"ok": true}`.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<ResponseBody, TransportError>>>,
    calls: Mutex<Vec<Call>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_result(&self, result: Result<ResponseBody, TransportError>) {
        self.script.lock().push_back(result);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.resource_path.clone()).collect()
    }

    /// Values of body field `field` in call order, rendered as strings.
    pub fn field(&self, field: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| c.body.get(field).map_or_else(String::new, ToString::to_string))
            .collect()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &SerializedRequest) -> Result<ResponseBody, TransportError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.calls.lock().push(Call {
            resource_path: request.resource_path.clone(),
            body: request.body.clone(),
            auth_token: request.auth_token.clone(),
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(serde_json::json!({ "ok": true })))
    }
}

/// Store wrapper whose operations can be made to fail on demand.
pub struct FlakyStore {
    inner: Arc<dyn TaskStore>,
    fail_create: AtomicBool,
    fail_read: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Self::wrap(Arc::new(InMemoryTaskStore::new()))
    }

    pub fn wrap(inner: Arc<dyn TaskStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        })
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Io(std::io::Error::other(format!("{op} failed"))))
        } else {
            Ok(())
        }
    }
}

impl TaskStore for FlakyStore {
    fn create(&self, kind: TaskKind, payload: String) -> Result<TaskId, StoreError> {
        Self::check(&self.fail_create, "create")?;
        self.inner.create(kind, payload)
    }

    fn next_pending(&self) -> Result<Option<TaskRecord>, StoreError> {
        Self::check(&self.fail_read, "read")?;
        self.inner.next_pending()
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(id)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }

    fn all_ids(&self) -> Result<Vec<TaskId>, StoreError> {
        self.inner.all_ids()
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        self.inner.clear_all()
    }
}
