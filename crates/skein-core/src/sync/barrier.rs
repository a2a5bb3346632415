//! Barrier (wait-group) - カウンタが 0 になるまで待つ

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::{BarrierId, BlockReason, SyncError};
use crate::sched::park::Waiter;
use crate::sched::{Cx, lock};

#[derive(Default)]
struct State {
    count: usize,
    waiters: VecDeque<Waiter<()>>,
}

struct Inner {
    id: BarrierId,
    state: Mutex<State>,
}

/// Counts outstanding work; `wait` returns once the count is zero.
///
/// `add` must happen before the matching `wait` can observe it. Calling it
/// before spawning the tasks that will call `done` is the usual way.
#[derive(Clone)]
pub struct Barrier {
    inner: Arc<Inner>,
}

impl Barrier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: BarrierId::next(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn id(&self) -> BarrierId {
        self.inner.id
    }

    pub fn count(&self) -> usize {
        lock(&self.inner.state).count
    }

    /// Raise the counter by `n`. Fails with `CounterOverflow`, leaving the
    /// counter as it was, if it would not fit in a `usize`.
    pub fn add(&self, n: usize) -> Result<(), SyncError> {
        let mut state = lock(&self.inner.state);
        state.count = state
            .count
            .checked_add(n)
            .ok_or(SyncError::CounterOverflow {
                barrier: self.inner.id,
            })?;
        Ok(())
    }

    /// Decrement the counter. Reaching zero wakes every waiter at once.
    ///
    /// Below zero is `NegativeCounter` and the counter stays at 0. The error
    /// ends the calling task only when the caller propagates it with `?`;
    /// a task that discards it keeps running.
    pub fn done(&self) -> Result<(), SyncError> {
        let mut state = lock(&self.inner.state);
        if state.count == 0 {
            return Err(SyncError::NegativeCounter {
                barrier: self.inner.id,
            });
        }
        state.count -= 1;
        if state.count == 0 {
            let released = state.waiters.len();
            for waiter in state.waiters.drain(..) {
                let _ = waiter.wake(());
            }
            debug!(barrier = %self.inner.id, released, "barrier reached zero");
        }
        Ok(())
    }

    pub async fn wait(&self, cx: &Cx) -> Result<(), SyncError> {
        let parked = {
            let mut state = lock(&self.inner.state);
            if state.count == 0 {
                return Ok(());
            }
            let (waiter, parked) = cx.park(BlockReason::BarrierWait(self.inner.id));
            state.waiters.push_back(waiter);
            parked
        };
        parked.wait().await
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("id", &self.inner.id)
            .field("count", &self.count())
            .finish()
    }
}
