//! Ordered in-memory index shared by the store backends.

use std::collections::{BTreeMap, HashMap};

use crate::core::task::{OrderKey, TaskKind, TaskRecord};
use crate::util::clock::now_ms;
use crate::util::serde::{new_task_id, TaskId};

/// Records ordered by [`OrderKey`] with an id lookup for point deletes.
#[derive(Debug, Default)]
pub(crate) struct TaskIndex {
    by_order: BTreeMap<OrderKey, TaskRecord>,
    by_id: HashMap<TaskId, OrderKey>,
    last: Option<OrderKey>,
}

impl TaskIndex {
    /// Build a fresh record whose order key sorts after every key seen so far,
    /// even if the wall clock stepped backwards.
    pub(crate) fn mint(&self, kind: TaskKind, payload: String) -> TaskRecord {
        let now = now_ms();
        let created_at = match self.last {
            Some(last) => OrderKey {
                created_at_ms: now.max(last.created_at_ms),
                seq: last.seq + 1,
            },
            None => OrderKey {
                created_at_ms: now,
                seq: 0,
            },
        };
        let mut id = new_task_id();
        while self.by_id.contains_key(&id) {
            id = new_task_id();
        }
        TaskRecord {
            id,
            kind,
            payload,
            created_at,
        }
    }

    /// Insert a record. Returns false if its id or order key is already present.
    pub(crate) fn insert(&mut self, record: TaskRecord) -> bool {
        if self.by_id.contains_key(&record.id) || self.by_order.contains_key(&record.created_at) {
            return false;
        }
        if self.last.is_none_or(|last| record.created_at > last) {
            self.last = Some(record.created_at);
        }
        self.by_id.insert(record.id.clone(), record.created_at);
        self.by_order.insert(record.created_at, record);
        true
    }

    pub(crate) fn first(&self) -> Option<&TaskRecord> {
        self.by_order.first_key_value().map(|(_, r)| r)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<TaskRecord> {
        let key = self.by_id.remove(id)?;
        self.by_order.remove(&key)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_order.len()
    }

    pub(crate) fn ids(&self) -> Vec<TaskId> {
        self.by_order.values().map(|r| r.id.clone()).collect()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.by_order.values()
    }

    /// Remove everything but keep the order-key high-water mark.
    pub(crate) fn clear(&mut self) -> usize {
        let n = self.by_order.len();
        self.by_order.clear();
        self.by_id.clear();
        n
    }
}
