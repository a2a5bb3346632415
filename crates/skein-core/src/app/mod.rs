//! App - プログラムの組み立てと実行
//!
//! - **builder**: 宣言とエントリを集め、起動前に初期化順序を確定する
//! - **program**: グローバル初期化 → main タスク → 終了/停止まで実行

pub mod builder;
pub mod program;

pub use self::builder::{BuildError, ProgramBuilder};
pub use self::program::{EntryFuture, Program, ProgramError};
