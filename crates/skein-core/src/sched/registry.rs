//! Task table: the single source of truth for task states.
//!
//! All transitions happen under one lock, and the phase is recomputed after
//! each of them. Primitives take their own lock before this one, never after.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::report::{BlockedTask, TaskSummary};
use crate::domain::{BlockReason, TaskId, TaskOutcome, TaskState};
use crate::observability::TaskCounts;

/// Phase of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// At least one live task is runnable.
    Running,
    /// No live tasks.
    Quiescent,
    /// Live tasks exist and every one of them is blocked.
    Stalled,
}

/// Identifies one blocking episode of a task. A wake carrying an older ticket
/// is stale and ignored.
pub(crate) type Ticket = u64;

#[derive(Debug)]
struct TaskEntry {
    name: String,
    state: TaskState,
    reason: Option<BlockReason>,
    ticket: Ticket,
    /// The current ticket is reserved but the task has not gone to sleep yet.
    armed: bool,
    outcome: Option<TaskOutcome>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    tasks: BTreeMap<TaskId, TaskEntry>,
    counts: TaskCounts,
}

impl Registry {
    pub(crate) fn register(&mut self, task: TaskId, name: String) {
        debug!(%task, name, "task spawned");
        self.tasks.insert(
            task,
            TaskEntry {
                name,
                state: TaskState::Runnable,
                reason: None,
                ticket: 0,
                armed: false,
                outcome: None,
            },
        );
        self.counts.runnable += 1;
    }

    /// Runnable -> Blocked. Returns the ticket a waker must present.
    pub(crate) fn block(&mut self, task: TaskId, reason: BlockReason) -> Ticket {
        let Some(entry) = self.tasks.get_mut(&task) else {
            warn!(%task, %reason, "unknown task tried to block");
            return 0;
        };
        match entry.state {
            TaskState::Runnable => {
                self.counts.runnable -= 1;
                self.counts.blocked += 1;
            }
            TaskState::Blocked => {
                warn!(%task, %reason, "task is already blocked; previous wait abandoned");
            }
            TaskState::Completed => return entry.ticket,
        }
        entry.state = TaskState::Blocked;
        entry.reason = Some(reason);
        entry.ticket += 1;
        entry.armed = false;
        debug!(%task, %reason, "task blocked");
        entry.ticket
    }

    /// Reserve the ticket of the next blocking episode while the task stays
    /// Runnable. Used when the task must enqueue waiters on several
    /// primitives before it can sleep.
    pub(crate) fn arm(&mut self, task: TaskId) -> Ticket {
        let Some(entry) = self.tasks.get_mut(&task) else {
            warn!(%task, "unknown task tried to arm");
            return 0;
        };
        if entry.state != TaskState::Runnable {
            return entry.ticket;
        }
        entry.ticket += 1;
        entry.armed = true;
        entry.ticket
    }

    /// Armed -> Blocked. False when a waker consumed the ticket first; the
    /// task then stays Runnable and its value is already on the way.
    pub(crate) fn commit(&mut self, task: TaskId, ticket: Ticket, reason: BlockReason) -> bool {
        let Some(entry) = self.tasks.get_mut(&task) else {
            return false;
        };
        if !entry.armed || entry.ticket != ticket || entry.state != TaskState::Runnable {
            return false;
        }
        entry.armed = false;
        entry.state = TaskState::Blocked;
        entry.reason = Some(reason);
        self.counts.runnable -= 1;
        self.counts.blocked += 1;
        debug!(%task, %reason, "task blocked");
        true
    }

    /// Blocked -> Runnable, if `ticket` is still current. An armed ticket is
    /// consumed without a state change.
    pub(crate) fn wake(&mut self, task: TaskId, ticket: Ticket) -> bool {
        let Some(entry) = self.tasks.get_mut(&task) else {
            return false;
        };
        if entry.ticket != ticket {
            return false;
        }
        if entry.state == TaskState::Runnable && entry.armed {
            entry.armed = false;
            debug!(%task, "task woken before it slept");
            return true;
        }
        if entry.state != TaskState::Blocked {
            return false;
        }
        entry.state = TaskState::Runnable;
        entry.reason = None;
        self.counts.blocked -= 1;
        self.counts.runnable += 1;
        debug!(%task, "task woken");
        true
    }

    pub(crate) fn complete(&mut self, task: TaskId, outcome: TaskOutcome) {
        let Some(entry) = self.tasks.get_mut(&task) else {
            return;
        };
        match entry.state {
            TaskState::Runnable => self.counts.runnable -= 1,
            TaskState::Blocked => self.counts.blocked -= 1,
            TaskState::Completed => return,
        }
        if !outcome.is_success() {
            self.counts.failed += 1;
        }
        self.counts.completed += 1;
        debug!(%task, ?outcome, "task completed");
        entry.state = TaskState::Completed;
        entry.outcome = Some(outcome);
    }

    pub(crate) fn phase(&self) -> Phase {
        if self.counts.live() == 0 {
            Phase::Quiescent
        } else if self.counts.runnable == 0 {
            Phase::Stalled
        } else {
            Phase::Running
        }
    }

    pub(crate) fn counts(&self) -> TaskCounts {
        self.counts
    }

    pub(crate) fn state(&self, task: TaskId) -> Option<TaskState> {
        self.tasks.get(&task).map(|e| e.state)
    }

    pub(crate) fn outcome(&self, task: TaskId) -> Option<TaskOutcome> {
        self.tasks.get(&task).and_then(|e| e.outcome.clone())
    }

    pub(crate) fn live_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|(_, e)| e.state.is_live())
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn blocked_tasks(&self) -> Vec<BlockedTask> {
        self.tasks
            .iter()
            .filter(|(_, e)| e.state == TaskState::Blocked)
            .filter_map(|(id, e)| {
                e.reason.map(|reason| BlockedTask {
                    id: *id,
                    name: e.name.clone(),
                    reason,
                })
            })
            .collect()
    }

    pub(crate) fn summaries(&self) -> Vec<TaskSummary> {
        self.tasks
            .iter()
            .map(|(id, e)| TaskSummary {
                id: *id,
                name: e.name.clone(),
                state: e.state,
                block_reason: e.reason,
                outcome: e.outcome.clone(),
            })
            .collect()
    }
}
