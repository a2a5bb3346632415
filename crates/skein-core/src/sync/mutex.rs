//! Mutex - 排他ロック
//!
//! 値を守るのではなく「誰が保持しているか」だけを管理する。共有したい状態は
//! 呼び出し側が acquire / release の間でだけ触る。

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use tracing::debug;

use crate::domain::{BlockReason, MutexId, SyncError, TaskId};
use crate::sched::park::Waiter;
use crate::sched::{Cx, lock};

#[derive(Default)]
struct State {
    holder: Option<TaskId>,
    /// FIFO order of arrival.
    waiters: VecDeque<Waiter<()>>,
}

struct Inner {
    id: MutexId,
    state: StdMutex<State>,
}

/// Non-reentrant lock with FIFO handoff.
///
/// A task acquiring a lock it already holds waits for itself, which the
/// scheduler reports as a stall.
#[derive(Clone)]
pub struct Mutex {
    inner: Arc<Inner>,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: MutexId::next(),
                state: StdMutex::new(State::default()),
            }),
        }
    }

    pub fn id(&self) -> MutexId {
        self.inner.id
    }

    pub fn holder(&self) -> Option<TaskId> {
        lock(&self.inner.state).holder
    }

    pub async fn acquire(&self, cx: &Cx) -> Result<(), SyncError> {
        let parked = {
            let mut state = lock(&self.inner.state);
            if state.holder.is_none() {
                state.holder = Some(cx.task_id());
                return Ok(());
            }
            let (waiter, parked) = cx.park(BlockReason::Acquire(self.inner.id));
            state.waiters.push_back(waiter);
            parked
        };
        // release() has already made us the holder.
        parked.wait().await
    }

    /// Take the lock only if it is free.
    pub fn try_acquire(&self, cx: &Cx) -> bool {
        let mut state = lock(&self.inner.state);
        if state.holder.is_some() {
            return false;
        }
        state.holder = Some(cx.task_id());
        true
    }

    /// Release the lock, handing it to the longest-waiting task if any.
    ///
    /// Only the holder may release; anyone else gets `IllegalRelease` and the
    /// lock is left untouched. Like every `SyncError`, it fails the task only
    /// when the caller propagates it with `?`; a task that discards it keeps
    /// running and the run report records nothing.
    pub fn release(&self, cx: &Cx) -> Result<(), SyncError> {
        let mut state = lock(&self.inner.state);
        if state.holder != Some(cx.task_id()) {
            return Err(SyncError::IllegalRelease {
                mutex: self.inner.id,
                task: cx.task_id(),
            });
        }
        state.holder = None;
        while let Some(waiter) = state.waiters.pop_front() {
            let next = waiter.task();
            if waiter.wake(()).is_ok() {
                debug!(mutex = %self.inner.id, from = %cx.task_id(), to = %next, "lock handed off");
                state.holder = Some(next);
                break;
            }
        }
        Ok(())
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("id", &self.inner.id)
            .field("holder", &self.holder())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::domain::{TaskError, TaskOutcome, TaskState};
    use crate::sched::Scheduler;
    use crate::test_support::init_test_logging;
    use std::time::Duration;
    use tokio::time::timeout;

    const LIMIT: Duration = Duration::from_secs(5);

    fn scheduler() -> Scheduler {
        init_test_logging();
        Scheduler::new(SchedulerConfig::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiters_acquire_in_arrival_order() {
        let scheduler = scheduler();
        let mutex = Mutex::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let m = mutex.clone();
        let log = Arc::clone(&order);
        scheduler.spawn("owner", move |cx| async move {
            m.acquire(&cx).await?;
            for i in 0..3 {
                let m = m.clone();
                let log = Arc::clone(&log);
                let handle = cx.spawn(format!("waiter-{i}"), move |cx| async move {
                    m.acquire(&cx).await?;
                    log.lock().unwrap().push(i);
                    m.release(&cx)?;
                    Ok(())
                });
                // One at a time so the queue order is known.
                while handle.state() != TaskState::Blocked {
                    tokio::task::yield_now().await;
                }
            }
            m.release(&cx)?;
            Ok(())
        });

        timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(mutex.holder(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn release_by_non_holder_fails_only_that_task() {
        let scheduler = scheduler();
        let mutex = Mutex::new();

        let m = mutex.clone();
        let intruder = scheduler.spawn("intruder", move |cx| async move {
            m.release(&cx)?;
            Ok(())
        });
        let m = mutex.clone();
        let user = scheduler.spawn("user", move |cx| async move {
            m.acquire(&cx).await?;
            m.release(&cx)?;
            Ok(())
        });

        timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        let expected = SyncError::IllegalRelease {
            mutex: mutex.id(),
            task: intruder.id(),
        };
        assert_eq!(
            intruder.outcome(),
            Some(TaskOutcome::Failed(expected.to_string()))
        );
        assert_eq!(user.outcome(), Some(TaskOutcome::Succeeded));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn discarded_illegal_release_keeps_the_task_running() {
        let scheduler = scheduler();
        let mutex = Mutex::new();

        let m = mutex.clone();
        let careless = scheduler.spawn("careless", move |cx| async move {
            let refused = m.release(&cx);
            if !matches!(refused, Err(SyncError::IllegalRelease { .. })) {
                return Err(TaskError::failed("release by non-holder was accepted"));
            }
            m.acquire(&cx).await?;
            m.release(&cx)?;
            Ok(())
        });

        let report = timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(careless.outcome(), Some(TaskOutcome::Succeeded));
        assert_eq!(report.counts.failed, 0);
        assert_eq!(mutex.holder(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reacquire_by_holder_is_a_stall() {
        let scheduler = scheduler();
        let mutex = Mutex::new();

        let m = mutex.clone();
        scheduler.spawn("main", move |cx| async move {
            assert!(m.try_acquire(&cx));
            assert!(!m.try_acquire(&cx));
            m.acquire(&cx).await?;
            Ok(())
        });

        let err = timeout(LIMIT, scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.blocked()[0].reason, BlockReason::Acquire(mutex.id()));
    }
}
