//! skein-core
//!
//! Concurrent runtime core: dependency-ordered initialization of global
//! declarations, plus tasks that coordinate through channels, mutexes and
//! barriers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, declaration, errors）
//! - **resolve**: 宣言の依存グラフ、初期化順序、グローバル値
//! - **sched**: スケジューラ（spawn, ブロック/再開, 停止検出, RunReport）
//! - **sync**: Channel / Select / Mutex / Barrier
//! - **capture**: クロージャが共有するキャプチャセル
//! - **app**: ProgramBuilder と Program
//! - **ports**: Clock / IdGenerator
//! - **config**: SchedulerConfig
//! - **observability**: タスク数の集計

pub mod app;
pub mod capture;
pub mod config;
pub mod domain;
pub mod observability;
pub mod ports;
pub mod resolve;
pub mod sched;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{BuildError, Program, ProgramBuilder, ProgramError};
pub use capture::{CaptureCell, for_each_iteration};
pub use config::{ConfigError, RuntimeFlavor, SchedulerConfig};
pub use domain::{
    BlockReason, Declaration, InitError, ResolveError, SyncError, TaskError, TaskId, TaskOutcome,
    TaskState,
};
pub use resolve::{Globals, initialize, resolve};
pub use sched::{Cx, RunReport, Scheduler, StallError, TaskHandle};
pub use sync::{Barrier, Channel, Mutex, Select};
