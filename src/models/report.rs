use serde::{Deserialize, Serialize};

use super::ResourceUsage;

/// A task the run could not evaluate, with the reason it was skipped.
///
/// Skips are local: the rest of the run still commits. They are surfaced
/// here so the caller can warn, never hidden behind a zero quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTask {
    pub task: String,
    pub reason: String,
}

/// Overall outcome of a committed run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task of every selected template was evaluated.
    Complete,
    /// The run committed, but some tasks were skipped.
    Partial,
}

/// What an estimation run produced.
///
/// Fatal failures (configuration or persistence errors) never produce a
/// report; they surface as [`crate::engine::EngineError`] and leave any
/// prior estimate intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Task nodes written to the estimate tree.
    pub tasks_created: usize,
    pub skipped: Vec<SkippedTask>,
    /// Per-resource grand totals across all tasks, ordered by code.
    pub resource_totals: Vec<ResourceUsage>,
    pub total_cost: f64,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.skipped.is_empty() {
            RunStatus::Complete
        } else {
            RunStatus::Partial
        }
    }
}
