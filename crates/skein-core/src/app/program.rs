//! Program - 初期化とスケジューラの実行

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::config::{ConfigError, SchedulerConfig};
use crate::domain::{DeclHeader, InitError, Initializer, TaskError};
use crate::resolve::{Globals, InitOrder, globals::run_initializers};
use crate::sched::{Cx, RunReport, Scheduler, StallError};

pub type EntryFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

pub(crate) type EntryBody<V> = Box<dyn FnOnce(Cx, Arc<Globals<V>>) -> EntryFuture + Send>;

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Stall(#[from] StallError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Name of the task running the entry body.
pub const ENTRY_TASK: &str = "main";

/// A resolved program, ready to run once.
pub struct Program<V> {
    headers: Vec<DeclHeader>,
    inits: Vec<Option<Initializer<V>>>,
    order: InitOrder,
    entry: EntryBody<V>,
    config: SchedulerConfig,
}

impl<V: Send + Sync + 'static> Program<V> {
    pub(crate) fn new(
        headers: Vec<DeclHeader>,
        inits: Vec<Option<Initializer<V>>>,
        order: InitOrder,
        entry: EntryBody<V>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            headers,
            inits,
            order,
            entry,
            config,
        }
    }

    pub fn order(&self) -> &InitOrder {
        &self.order
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run on a fresh scheduler. Must be called inside a tokio runtime.
    pub async fn run(self) -> Result<RunReport, ProgramError> {
        let scheduler = Scheduler::new(self.config.clone());
        self.run_on(&scheduler).await
    }

    /// Initialize the globals, then run `main` on `scheduler` until every task
    /// has completed or the run stalls.
    pub async fn run_on(self, scheduler: &Scheduler) -> Result<RunReport, ProgramError> {
        let globals = Arc::new(run_initializers(&self.headers, self.inits, &self.order)?);
        info!(run_id = %scheduler.run_id(), globals = globals.len(), "globals initialized");

        let entry = self.entry;
        scheduler.spawn(ENTRY_TASK, move |cx| entry(cx, globals));
        Ok(scheduler.run_until_quiescent().await?)
    }

    /// Build the runtime described by the config and run to completion on it.
    pub fn run_blocking(self) -> Result<RunReport, ProgramError> {
        let runtime = self.config.build_runtime()?;
        runtime.block_on(self.run())
    }
}
