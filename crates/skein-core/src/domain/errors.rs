//! Errors - エラー型と分類
//!
//! - `SyncError`: プリミティブ操作の失敗。呼び出したタスクだけが失敗し、
//!   プリミティブの内部状態は他のタスクから見て壊れない。
//! - `TaskError`: タスク本体が返すエラー。
//! - `ResolveError` / `InitError`: グローバル宣言の解決と初期化。

use thiserror::Error;

use super::ids::{BarrierId, ChannelId, MutexId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("{task} released {mutex} without holding it")]
    IllegalRelease { mutex: MutexId, task: TaskId },

    #[error("{barrier} counter would go negative")]
    NegativeCounter { barrier: BarrierId },

    #[error("{barrier} counter overflowed")]
    CounterOverflow { barrier: BarrierId },

    #[error("{channel} is closed")]
    ChannelClosed { channel: ChannelId },

    #[error("wake-up source dropped while waiting")]
    Disconnected,
}

/// Error returned by a task body. Ends the task, never the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A global read from inside a task failed.
    #[error(transparent)]
    Init(#[from] InitError),

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("cyclic dependency in global declarations: {}", .members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("duplicate global declaration: {0}")]
    DuplicateDeclaration(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{requested_by} read {name} before it was initialized")]
    Uninitialized { name: String, requested_by: String },

    #[error("variable {0} has no initializer")]
    MissingInitializer(String),

    #[error("initializer of {name} failed: {message}")]
    Failed { name: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_converts_into_task_error() {
        let err: TaskError = SyncError::NegativeCounter {
            barrier: BarrierId::from_seq(1),
        }
        .into();
        assert_eq!(err.to_string(), "barrier-1 counter would go negative");
    }

    #[test]
    fn cycle_error_lists_members() {
        let err = ResolveError::Cycle {
            members: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "cyclic dependency in global declarations: a -> b -> a"
        );
    }
}
