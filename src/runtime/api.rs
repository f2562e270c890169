//! Serializable status models for host debug screens and support dumps.

use serde::{Deserialize, Serialize};

use crate::core::{HealthSnapshot, OfflinePipeline, RunnerDiagnostics};
use crate::util::serde::TaskId;

/// Combined pipeline status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Health gates and queue length.
    pub health: HealthSnapshot,
    /// Runner state.
    pub runner: RunnerDiagnostics,
    /// Pending task ids, oldest first. Empty if the store could not be read.
    pub pending: Vec<TaskId>,
}

/// Capture the current pipeline status.
#[must_use]
pub fn snapshot(pipeline: &OfflinePipeline) -> PipelineSnapshot {
    PipelineSnapshot {
        health: pipeline.health(),
        runner: pipeline.diagnostics(),
        pending: pipeline.pending_task_ids().unwrap_or_default(),
    }
}

impl PipelineSnapshot {
    /// Render as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if encoding fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
