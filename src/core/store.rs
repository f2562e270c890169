//! Durable task store abstraction.

use crate::core::error::StoreError;
use crate::core::task::{TaskKind, TaskRecord};
use crate::util::serde::TaskId;

/// Append/read/delete persistence for task records with FIFO retrieval.
///
/// Implementations serialize physical access internally, so every method is
/// callable from any thread and concurrent `create` calls never share an id or
/// an order key.
pub trait TaskStore: Send + Sync {
    /// Persist a new record with a fresh id and the next order key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on any I/O or encoding failure; nothing is persisted.
    fn create(&self, kind: TaskKind, payload: String) -> Result<TaskId, StoreError>;

    /// Oldest pending record, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn next_pending(&self) -> Result<Option<TaskRecord>, StoreError>;

    /// Remove a record. Deleting a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the removal cannot be persisted.
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Number of pending records.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn count(&self) -> Result<usize, StoreError>;

    /// Ids of every pending record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn all_ids(&self) -> Result<Vec<TaskId>, StoreError>;

    /// Delete every pending record, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the removal cannot be persisted.
    fn clear_all(&self) -> Result<usize, StoreError>;
}
