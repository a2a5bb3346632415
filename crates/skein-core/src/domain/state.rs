//! Task state machine.

use serde::Serialize;
use std::fmt;

use super::ids::{BarrierId, ChannelId, MutexId};

/// TaskState はタスクの状態を表現
///
/// # 状態遷移
/// - Runnable -> Blocked -> Runnable (send/receive, acquire, wait, select)
/// - Runnable -> Completed
///
/// Blocked のタスクを Runnable に戻せるのは、対応するプリミティブの操作だけ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Runnable,
    Blocked,
    Completed,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed)
    }

    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }
}

/// BlockReason は Blocked の詳細理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "op", content = "resource", rename_all = "snake_case")]
pub enum BlockReason {
    Send(ChannelId),
    Receive(ChannelId),
    Acquire(MutexId),
    BarrierWait(BarrierId),
    /// Waiting on every case of a select at once.
    Select,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Send(id) => write!(f, "send on {id}"),
            BlockReason::Receive(id) => write!(f, "receive on {id}"),
            BlockReason::Acquire(id) => write!(f, "acquire {id}"),
            BlockReason::BarrierWait(id) => write!(f, "wait on {id}"),
            BlockReason::Select => f.write_str("select"),
        }
    }
}

/// How a completed task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    /// The body returned an error (IllegalRelease, NegativeCounter, ...).
    Failed(String),
    Panicked(String),
    /// Dropped by the scheduler after a stall.
    Aborted,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}
