//! Parking and waking tasks.
//!
//! A primitive that cannot proceed calls `Cx::park` while holding
//! its own lock, stores the [`Waiter`] in its FIFO queue, releases the lock and
//! awaits the [`Parked`] half. Whoever later satisfies the condition pops the
//! waiter and calls [`Waiter::wake`], again under the primitive's lock.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::registry::Ticket;
use super::scheduler::Shared;
use crate::domain::{BlockReason, SyncError, TaskId};

/// The waking half, kept in a primitive's wait queue.
pub(crate) struct Waiter<T> {
    shared: Arc<Shared>,
    task: TaskId,
    ticket: Ticket,
    tx: oneshot::Sender<T>,
}

impl<T> Waiter<T> {
    pub(crate) fn task(&self) -> TaskId {
        self.task
    }

    /// Marks the task runnable and hands it `value`.
    ///
    /// Gives the value back when the waiting side is gone (its wait was
    /// cancelled or the task was aborted); the caller then tries the next
    /// waiter in line.
    pub(crate) fn wake(self, value: T) -> Result<(), T> {
        if self.tx.is_closed() {
            return Err(value);
        }
        if !self.shared.transition(|r| r.wake(self.task, self.ticket)) {
            return Err(value);
        }
        self.tx.send(value)
    }
}

/// The sleeping half, awaited by the blocked task.
pub(crate) struct Parked<T> {
    shared: Arc<Shared>,
    task: TaskId,
    ticket: Ticket,
    rx: oneshot::Receiver<T>,
    woken: bool,
}

impl<T> Parked<T> {
    pub(crate) async fn wait(mut self) -> Result<T, SyncError> {
        match (&mut self.rx).await {
            Ok(value) => {
                self.woken = true;
                Ok(value)
            }
            Err(_) => Err(SyncError::Disconnected),
        }
    }
}

impl<T> Drop for Parked<T> {
    // 待機が途中で捨てられた場合、タスクはもう眠っていない
    fn drop(&mut self) {
        if !self.woken {
            self.shared.transition(|r| r.wake(self.task, self.ticket));
        }
    }
}

/// One blocking episode spread over several wait queues.
///
/// Every waiter made from the episode carries the same ticket, so the first
/// wake wins and the rest turn stale. The task stays Runnable until
/// [`Episode::commit`]; a wake that lands before then is kept, not lost.
/// Dropping the episode ends it.
pub(crate) struct Episode {
    shared: Arc<Shared>,
    task: TaskId,
    ticket: Ticket,
}

impl Episode {
    pub(crate) fn new(shared: &Arc<Shared>, task: TaskId) -> Self {
        let ticket = shared.transition(|r| r.arm(task));
        Self {
            shared: Arc::clone(shared),
            task,
            ticket,
        }
    }

    pub(crate) fn task(&self) -> TaskId {
        self.task
    }

    pub(crate) fn pair<T>(&self) -> (Waiter<T>, Parked<T>) {
        pair(&self.shared, self.task, self.ticket)
    }

    /// Go to sleep. False when a waiter of this episode was already woken.
    pub(crate) fn commit(&self, reason: BlockReason) -> bool {
        self.shared.transition(|r| r.commit(self.task, self.ticket, reason))
    }

    /// Withdraw from the episode. False when a waker got there first.
    pub(crate) fn cancel(&self) -> bool {
        self.shared.transition(|r| r.wake(self.task, self.ticket))
    }
}

impl Drop for Episode {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub(crate) fn pair<T>(
    shared: &Arc<Shared>,
    task: TaskId,
    ticket: Ticket,
) -> (Waiter<T>, Parked<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Waiter {
            shared: Arc::clone(shared),
            task,
            ticket,
            tx,
        },
        Parked {
            shared: Arc::clone(shared),
            task,
            ticket,
            rx,
            woken: false,
        },
    )
}
