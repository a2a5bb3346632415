//! Scheduler - タスクの生成、ブロック/再開、停止（stall）の検出
//!
//! - **scheduler**: `Scheduler` と `TaskHandle`
//! - **context**: タスク本体に渡される `Cx`
//! - **park**: プリミティブがタスクを眠らせ、起こすための待機票
//! - **registry**: タスク状態の表（内部）
//! - **report**: `RunReport` と `StallError`

pub mod context;
pub(crate) mod park;
mod registry;
pub mod report;
pub mod scheduler;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use self::context::Cx;
pub use self::report::{BlockedTask, RunReport, StallError, TaskSummary};
pub use self::scheduler::{Scheduler, TaskHandle};

/// A poisoned lock only means some task panicked while holding it; the data
/// behind every lock in this crate stays consistent between statements.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
