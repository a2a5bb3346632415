use serde::{Deserialize, Serialize};

/// Task counts by state, for status views and run reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub runnable: usize,
    pub blocked: usize,
    pub completed: usize,
    /// Completed tasks whose outcome was not a success.
    pub failed: usize,
}

impl TaskCounts {
    pub fn live(&self) -> usize {
        self.runnable + self.blocked
    }
}
