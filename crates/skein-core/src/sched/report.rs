//! Run reports and the stall diagnosis.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::domain::{BlockReason, RunId, TaskId, TaskOutcome, TaskState};
use crate::observability::TaskCounts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Current reason while blocked; after an abort, the last one.
    pub block_reason: Option<BlockReason>,
    pub outcome: Option<TaskOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
    pub id: TaskId,
    pub name: String,
    pub reason: BlockReason,
}

impl fmt::Display for BlockedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) blocked on {}", self.id, self.name, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: TaskCounts,
    pub tasks: Vec<TaskSummary>,
    /// Tasks that were permanently blocked when the run stalled.
    pub stalled: Vec<BlockedTask>,
}

impl RunReport {
    pub fn task(&self, name: &str) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Completed tasks whose outcome was not a success.
    pub fn failures(&self) -> impl Iterator<Item = &TaskSummary> {
        self.tasks
            .iter()
            .filter(|t| t.outcome.as_ref().is_some_and(|o| !o.is_success()))
    }

    pub fn is_stalled(&self) -> bool {
        !self.stalled.is_empty()
    }
}

/// Every live task was blocked on a condition no remaining task can satisfy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("all tasks are asleep - deadlock: {}", describe(.report))]
pub struct StallError {
    pub report: RunReport,
}

impl StallError {
    pub fn blocked(&self) -> &[BlockedTask] {
        &self.report.stalled
    }

    pub fn is_blocked(&self, name: &str) -> bool {
        self.report.stalled.iter().any(|t| t.name == name)
    }
}

fn describe(report: &RunReport) -> String {
    report
        .stalled
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
