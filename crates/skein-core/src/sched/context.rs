//! Per-task context.

use std::future::Future;
use std::sync::Arc;

use super::park::{self, Episode, Parked, Waiter};
use super::scheduler::{Shared, TaskHandle};
use crate::domain::{BlockReason, TaskError, TaskId};

/// Handed to every task body. Blocking operations borrow it to learn which
/// task is about to sleep.
///
/// `Cx` is deliberately not `Clone`: one context belongs to exactly one task.
pub struct Cx {
    task: TaskId,
    shared: Arc<Shared>,
}

impl Cx {
    pub(crate) fn new(task: TaskId, shared: Arc<Shared>) -> Self {
        Self { task, shared }
    }

    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Spawn a sibling task. The caller keeps running (fire-and-forget).
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, body: F) -> TaskHandle
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Shared::spawn(&self.shared, name.into(), body)
    }

    /// Runnable -> Blocked. Must be called under the lock of the primitive
    /// that will hold the returned waiter.
    pub(crate) fn park<T>(&self, reason: BlockReason) -> (Waiter<T>, Parked<T>) {
        let ticket = self.shared.transition(|r| r.block(self.task, reason));
        park::pair(&self.shared, self.task, ticket)
    }

    /// Start a blocking episode that will wait on several primitives.
    pub(crate) fn episode(&self) -> Episode {
        Episode::new(&self.shared, self.task)
    }
}

impl std::fmt::Debug for Cx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cx").field("task", &self.task).finish()
    }
}
