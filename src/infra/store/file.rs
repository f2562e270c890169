//! File-backed task store.
//!
//! Records are kept in an append-only JSON-lines log (`<dir>/<stream>.jsonl`).
//! A create appends the record, a delete appends a tombstone, and the log is
//! compacted by an atomic rewrite (temp file + rename) once tombstones outnumber
//! live records. The full log is replayed into an ordered index on open.
//!
//! A failed append is truncated away. Lines that still cannot be parsed on open
//! (a torn tail after a crash, or a fragment whose rollback also failed) are
//! skipped with a warning and dropped by the rewrite that follows the load.

use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::index::TaskIndex;
use crate::core::{StoreError, TaskKind, TaskRecord, TaskStore};
use crate::util::serde::TaskId;

/// Minimum number of tombstones before compaction is considered.
const COMPACT_MIN_TOMBSTONES: usize = 64;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogEntry {
    Create { record: TaskRecord },
    Delete { id: TaskId },
}

#[derive(Debug, Default)]
struct FileState {
    index: TaskIndex,
    tombstones: usize,
    /// The log may end in a partial line; the next append starts on a fresh one.
    torn_tail: bool,
}

/// Durable [`TaskStore`] persisted as a JSON-lines log.
pub struct FileTaskStore {
    path: PathBuf,
    stream: String,
    state: Mutex<FileState>,
}

impl FileTaskStore {
    /// Open (or create) the store for `stream` under directory `path` and replay
    /// any records left by a previous process.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the directory or log cannot be read or written,
    /// or `StoreError::Corrupt` if two records share an id or order key.
    pub fn open(path: impl AsRef<Path>, stream: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let stream = stream.into();
        create_dir_all(&path)?;
        let store = Self {
            path,
            stream,
            state: Mutex::new(FileState::default()),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    /// Location of the log file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.path.join(format!("{}.jsonl", self.stream))
    }

    fn temp_path(&self) -> PathBuf {
        self.path.join(format!("{}.jsonl.tmp", self.stream))
    }

    fn load_from_disk(&self) -> Result<(), StoreError> {
        let file_path = self.file_path();
        let contents = match fs::read_to_string(&file_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut state = self.state.lock();
        let complete = contents.ends_with('\n');
        let lines: Vec<&str> = contents.lines().collect();
        let mut skipped = 0usize;

        for (n, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(e) => {
                    if n + 1 == lines.len() && !complete {
                        warn!(error = %e, "discarding torn trailing record in task log");
                    } else {
                        warn!(line = n + 1, error = %e, "skipping unreadable record in task log");
                    }
                    skipped += 1;
                    continue;
                }
            };
            match entry {
                LogEntry::Create { record } => {
                    let id = record.id.clone();
                    if !state.index.insert(record) {
                        return Err(StoreError::Corrupt(format!("duplicate record {id} in task log")));
                    }
                }
                LogEntry::Delete { id } => {
                    state.index.remove(&id);
                    state.tombstones += 1;
                }
            }
        }

        info!(
            stream = %self.stream,
            pending = state.index.len(),
            skipped,
            "task log loaded"
        );

        if skipped > 0 || state.tombstones > 0 {
            self.rewrite_disk(&state.index)?;
            state.tombstones = 0;
        }
        Ok(())
    }

    fn append_to_disk(&self, state: &mut FileState, entry: &LogEntry) -> Result<(), StoreError> {
        let line = serde_json::to_string(entry)?;
        let mut buf = String::with_capacity(line.len() + 2);
        if state.torn_tail {
            buf.push('\n');
        }
        buf.push_str(&line);
        buf.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path())?;
        let len = file.metadata()?.len();
        if let Err(e) = file.write_all(buf.as_bytes()).and_then(|()| file.sync_data()) {
            // Never leave a partial record for the next append to run into.
            if let Err(rollback) = file.set_len(len) {
                warn!(error = %rollback, "could not roll back partial task log append");
                state.torn_tail = true;
            }
            return Err(e.into());
        }
        state.torn_tail = false;
        Ok(())
    }

    fn rewrite_disk(&self, index: &TaskIndex) -> Result<(), StoreError> {
        let temp_path = self.temp_path();
        {
            let mut file = File::create(&temp_path)?;
            for record in index.records() {
                let line = serde_json::to_string(&LogEntry::Create {
                    record: record.clone(),
                })?;
                writeln!(file, "{line}")?;
            }
            file.sync_all()?;
        }
        fs::rename(&temp_path, self.file_path())?;
        Ok(())
    }

    fn maybe_compact(&self, state: &mut FileState) {
        if state.tombstones < COMPACT_MIN_TOMBSTONES || state.tombstones <= state.index.len() {
            return;
        }
        match self.rewrite_disk(&state.index) {
            Ok(()) => {
                debug!(dropped = state.tombstones, "task log compacted");
                state.tombstones = 0;
                state.torn_tail = false;
            }
            // The log is still valid without compaction; try again on a later delete.
            Err(e) => warn!(error = %e, "task log compaction failed"),
        }
    }
}

impl TaskStore for FileTaskStore {
    fn create(&self, kind: TaskKind, payload: String) -> Result<TaskId, StoreError> {
        let mut state = self.state.lock();
        let record = state.index.mint(kind, payload);
        let id = record.id.clone();
        self.append_to_disk(
            &mut state,
            &LogEntry::Create {
                record: record.clone(),
            },
        )?;
        if !state.index.insert(record) {
            return Err(StoreError::Corrupt(format!("order key collision for {id}")));
        }
        Ok(id)
    }

    fn next_pending(&self) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.state.lock().index.first().cloned())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if !state.index.contains(id) {
            return Ok(());
        }
        self.append_to_disk(&mut state, &LogEntry::Delete { id: id.to_string() })?;
        state.index.remove(id);
        state.tombstones += 1;
        self.maybe_compact(&mut state);
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().index.len())
    }

    fn all_ids(&self) -> Result<Vec<TaskId>, StoreError> {
        Ok(self.state.lock().index.ids())
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        let mut state = self.state.lock();
        self.rewrite_disk(&TaskIndex::default())?;
        state.tombstones = 0;
        state.torn_tail = false;
        Ok(state.index.clear())
    }
}

impl std::fmt::Debug for FileTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTaskStore")
            .field("path", &self.path)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}
