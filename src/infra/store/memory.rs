//! In-memory task store for tests and hosts without persistent storage.

use parking_lot::Mutex;

use super::index::TaskIndex;
use crate::core::{StoreError, TaskKind, TaskRecord, TaskStore};
use crate::util::serde::TaskId;

/// Volatile [`TaskStore`] backed by an ordered map.
///
/// Provides O(log n) create, next and delete. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    index: Mutex<TaskIndex>,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn create(&self, kind: TaskKind, payload: String) -> Result<TaskId, StoreError> {
        let mut index = self.index.lock();
        let record = index.mint(kind, payload);
        let id = record.id.clone();
        if !index.insert(record) {
            return Err(StoreError::Corrupt(format!("order key collision for {id}")));
        }
        Ok(id)
    }

    fn next_pending(&self) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.index.lock().first().cloned())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.index.lock().remove(id);
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.index.lock().len())
    }

    fn all_ids(&self) -> Result<Vec<TaskId>, StoreError> {
        Ok(self.index.lock().ids())
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        Ok(self.index.lock().clear())
    }
}
