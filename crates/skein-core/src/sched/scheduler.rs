//! Scheduler - タスクの実行と停止検出
//!
//! # 実行モデル
//! - タスク本体は `tokio::spawn` で動く（multi_thread なら真の並列）
//! - 状態遷移（Runnable / Blocked / Completed）は `Registry` にだけ記録する
//! - 遷移のたびに `Phase` を再計算し、watch チャネルへ流す
//!
//! # 停止（stall）の判定
//! タスクを起こせるのは実行中のタスクだけなので、生きているタスクが全員
//! Blocked になった時点で二度と進まないことが確定する。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinError};
use tracing::{info, warn};

use super::context::Cx;
use super::lock;
use super::registry::{Phase, Registry};
use super::report::{RunReport, StallError};
use crate::config::SchedulerConfig;
use crate::domain::{RunId, TaskError, TaskId, TaskOutcome, TaskState};
use crate::observability::TaskCounts;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

/// State shared by the scheduler, every task context and every parked waiter.
pub(crate) struct Shared {
    registry: Mutex<Registry>,
    phase: watch::Sender<Phase>,
    /// Abort handles of tasks that have not finished yet.
    aborts: Mutex<HashMap<TaskId, AbortHandle>>,
}

impl Shared {
    fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Quiescent);
        Self {
            registry: Mutex::new(Registry::default()),
            phase,
            aborts: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one state transition and publish the resulting phase.
    pub(crate) fn transition<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut registry = lock(&self.registry);
        let out = f(&mut registry);
        let phase = registry.phase();
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
        out
    }

    fn inspect<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&lock(&self.registry))
    }

    /// The task is registered as Runnable before tokio ever sees it, so the
    /// spawner and the new task are never both invisible to stall detection.
    pub(crate) fn spawn<F, Fut>(self: &Arc<Self>, name: String, body: F) -> TaskHandle
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let id = TaskId::next();
        self.transition(|r| r.register(id, name.clone()));

        let inner = tokio::spawn(body(Cx::new(id, Arc::clone(self))));
        lock(&self.aborts).insert(id, inner.abort_handle());

        let shared = Arc::clone(self);
        let task_name = name.clone();
        tokio::spawn(async move {
            let outcome = outcome_of(inner.await);
            lock(&shared.aborts).remove(&id);
            if !outcome.is_success() {
                warn!(task = %id, name = %task_name, ?outcome, "task did not succeed");
            }
            shared.transition(|r| r.complete(id, outcome));
        });

        TaskHandle {
            id,
            name,
            shared: Arc::clone(self),
        }
    }

    fn abort_live(&self) {
        let live = self.inspect(|r| r.live_tasks());
        let aborts = lock(&self.aborts);
        for handle in live.iter().filter_map(|id| aborts.get(id)) {
            handle.abort();
        }
    }
}

fn outcome_of(result: Result<Result<(), TaskError>, JoinError>) -> TaskOutcome {
    match result {
        Ok(Ok(())) => TaskOutcome::Succeeded,
        Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_string());
            TaskOutcome::Panicked(message)
        }
        Err(_) => TaskOutcome::Aborted,
    }
}

/// Scheduler はタスクを生成し、全タスクの終了または停止まで見届ける
///
/// # 使用例
/// ```ignore
/// let scheduler = Scheduler::new(SchedulerConfig::default());
/// scheduler.spawn("main", |cx| async move { /* ... */ Ok(()) });
/// let report = scheduler.run_until_quiescent().await?;
/// ```
///
/// `spawn` は tokio ランタイムの中から呼ぶこと。
pub struct Scheduler {
    shared: Arc<Shared>,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    run_id: RunId,
    started_at: DateTime<Utc>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_ports(config, Arc::new(SystemClock), &UlidGenerator::new(SystemClock))
    }

    /// Clock と IdGenerator を差し替えて作成（テスト用）
    pub fn with_ports(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
        ids: &dyn IdGenerator,
    ) -> Self {
        let started_at = clock.now();
        Self {
            shared: Arc::new(Shared::new()),
            config,
            clock,
            run_id: ids.generate_run_id(),
            started_at,
        }
    }

    pub fn spawn<F, Fut>(&self, name: impl Into<String>, body: F) -> TaskHandle
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Shared::spawn(&self.shared, name.into(), body)
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn counts(&self) -> TaskCounts {
        self.shared.inspect(|r| r.counts())
    }

    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        self.shared.inspect(|r| r.state(task))
    }

    /// Wait until every task has completed, or until every live task is
    /// blocked.
    ///
    /// On a stall the report is taken first, so it shows the blocked tasks
    /// and what each was waiting for. With `abort_on_stall` the blocked tasks
    /// are then aborted and this returns once they are gone.
    pub async fn run_until_quiescent(&self) -> Result<RunReport, StallError> {
        info!(run_id = %self.run_id, counts = ?self.counts(), "run started");

        let mut phase = self.shared.phase.subscribe();
        // Sender lives in `self.shared`, so the wait cannot fail.
        let settled = phase
            .wait_for(|p| *p != Phase::Running)
            .await
            .map(|p| *p)
            .unwrap_or(Phase::Quiescent);

        let report = self.report(settled == Phase::Stalled);
        if !report.is_stalled() {
            info!(run_id = %self.run_id, counts = ?report.counts, "run finished");
            return Ok(report);
        }

        for task in &report.stalled {
            warn!(run_id = %self.run_id, task = %task.id, name = %task.name, reason = %task.reason, "task blocked forever");
        }
        if self.config.abort_on_stall {
            self.shared.abort_live();
            let _ = phase.wait_for(|p| *p == Phase::Quiescent).await;
        }
        Err(StallError { report })
    }

    fn report(&self, stalled: bool) -> RunReport {
        let finished_at = self.clock.now();
        self.shared.inspect(|r| RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            counts: r.counts(),
            tasks: r.summaries(),
            stalled: if stalled { r.blocked_tasks() } else { Vec::new() },
        })
    }
}

/// Handle to a spawned task. Dropping it does not affect the task.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    name: String,
    shared: Arc<Shared>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        // Registry entries are never removed.
        self.shared
            .inspect(|r| r.state(self.id))
            .unwrap_or(TaskState::Completed)
    }

    /// `None` until the task has completed.
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.shared.inspect(|r| r.outcome(self.id))
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeFlavor;
    use crate::domain::{BlockReason, ChannelId};
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use std::time::Duration;
    use tokio::time::timeout;

    fn scheduler() -> Scheduler {
        crate::test_support::init_test_logging();
        Scheduler::new(SchedulerConfig::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn no_tasks_is_quiescent() {
        let report = scheduler().run_until_quiescent().await.unwrap();
        assert!(report.tasks.is_empty());
        assert_eq!(report.counts, TaskCounts::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn nested_spawns_all_complete() {
        let scheduler = scheduler();
        scheduler.spawn("main", |cx| async move {
            for i in 0..3 {
                cx.spawn(format!("child-{i}"), |_| async { Ok(()) });
            }
            Ok(())
        });

        let report = timeout(Duration::from_secs(5), scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.counts.completed, 4);
        assert_eq!(report.counts.live(), 0);
        assert!(report.task("child-2").is_some());
        assert!(lock(&scheduler.shared.aborts).is_empty());
    }

    fn explode() -> Result<(), TaskError> {
        panic!("kaboom")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failure_and_panic_end_only_that_task() {
        let scheduler = scheduler();
        let failing = scheduler.spawn("failing", |_| async { Err(TaskError::failed("boom")) });
        let panicking = scheduler.spawn("panicking", |_| async { explode() });
        let fine = scheduler.spawn("fine", |_| async { Ok(()) });

        let report = timeout(Duration::from_secs(5), scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(failing.outcome(), Some(TaskOutcome::Failed("boom".into())));
        assert_eq!(panicking.outcome(), Some(TaskOutcome::Panicked("kaboom".into())));
        assert_eq!(fine.outcome(), Some(TaskOutcome::Succeeded));
        assert_eq!(report.counts.failed, 2);
        assert_eq!(report.failures().count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sleeping_task_is_not_a_stall() {
        let scheduler = scheduler();
        scheduler.spawn("sleeper", |_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        assert!(scheduler.run_until_quiescent().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parked_task_is_reported_and_aborted() {
        let scheduler = scheduler();
        let reason = BlockReason::Receive(ChannelId::from_seq(99));
        let handle = scheduler.spawn("sleeper", move |cx| async move {
            // Nobody else holds the waiter, so nothing can wake this task.
            let (waiter, parked) = cx.park::<()>(reason);
            let woken = parked.wait().await;
            drop(waiter);
            woken?;
            Ok(())
        });

        let err = timeout(Duration::from_secs(5), scheduler.run_until_quiescent())
            .await
            .unwrap()
            .unwrap_err();

        assert!(err.is_blocked("sleeper"));
        assert_eq!(err.blocked()[0].reason, reason);
        assert_eq!(handle.outcome(), Some(TaskOutcome::Aborted));
        assert_eq!(scheduler.counts().live(), 0);
        assert!(lock(&scheduler.shared.aborts).is_empty());
    }

    #[test]
    fn report_uses_injected_ports() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let config = SchedulerConfig {
            flavor: RuntimeFlavor::CurrentThread,
            ..SchedulerConfig::default()
        };
        let rt = config.build_runtime().unwrap();
        let scheduler = Scheduler::with_ports(
            config,
            Arc::new(FixedClock::new(at)),
            &UlidGenerator::new(FixedClock::new(at)),
        );

        let report = rt.block_on(scheduler.run_until_quiescent()).unwrap();
        assert_eq!(report.started_at, at);
        assert_eq!(report.finished_at, at);
        assert_eq!(report.run_id, scheduler.run_id());
    }
}
