//! ProgramBuilder - プログラムの構築
//!
//! # Fail-fast 設計
//! - build() の時点で宣言の依存関係を解決する
//! - 循環があれば、初期化子を一つも実行せずに BuildError を返す

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use super::program::{EntryBody, Program};
use crate::config::SchedulerConfig;
use crate::domain::{Declaration, ResolveError, TaskError};
use crate::resolve::{Globals, resolve};
use crate::sched::Cx;

/// ProgramBuilder はグローバル宣言と main タスクを集める
///
/// # 使用例
/// ```ignore
/// let program = ProgramBuilder::new()
///     .declare(Declaration::variable("x", ["y"], |g| Ok(g.get("y")? + 1)))
///     .declare(Declaration::variable("y", Vec::<String>::new(), |_| Ok(1)))
///     .entry(|cx, globals| async move { Ok(()) })
///     .build()?;
/// ```
pub struct ProgramBuilder<V> {
    decls: Vec<Declaration<V>>,
    entry: Option<EntryBody<V>>,
    config: SchedulerConfig,
}

/// BuildError はプログラム構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("program has no entry task")]
    MissingEntry,

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl<V: Send + Sync + 'static> ProgramBuilder<V> {
    pub fn new() -> Self {
        Self {
            decls: Vec::new(),
            entry: None,
            config: SchedulerConfig::default(),
        }
    }

    /// グローバル宣言を追加（宣言順は同順位の初期化順になる）
    pub fn declare(mut self, decl: Declaration<V>) -> Self {
        self.decls.push(decl);
        self
    }

    /// main タスクの本体。グローバルは初期化済みの状態で渡される。
    pub fn entry<F, Fut>(mut self, body: F) -> Self
    where
        F: FnOnce(Cx, Arc<Globals<V>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.entry = Some(Box::new(move |cx, globals| Box::pin(body(cx, globals))));
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// 依存関係を解決して Program を生成
    ///
    /// # 検証
    /// - エントリが無ければ BuildError::MissingEntry
    /// - 宣言の重複・循環は BuildError::Resolve
    pub fn build(self) -> Result<Program<V>, BuildError> {
        let entry = self.entry.ok_or(BuildError::MissingEntry)?;
        let (headers, inits): (Vec<_>, Vec<_>) =
            self.decls.into_iter().map(Declaration::into_parts).unzip();
        let order = resolve(&headers)?;
        debug!(order = ?order.names(), "initialization order resolved");
        Ok(Program::new(headers, inits, order, entry, self.config))
    }
}

impl<V: Send + Sync + 'static> Default for ProgramBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i64) -> impl FnOnce(&Globals<i64>) -> Result<i64, crate::domain::InitError> {
        move |_| Ok(value)
    }

    #[test]
    fn test_build_success() {
        let program = ProgramBuilder::<i64>::new()
            .declare(Declaration::variable("b", ["a"], |g: &Globals<i64>| Ok(g.get("a")? * 2)))
            .declare(Declaration::variable("a", Vec::<String>::new(), constant(1)))
            .entry(|_, _| async { Ok(()) })
            .build()
            .unwrap();
        assert_eq!(program.order().names(), &["a", "b"]);
    }

    #[test]
    fn test_build_missing_entry() {
        let result = ProgramBuilder::<i64>::new()
            .declare(Declaration::variable("a", Vec::<String>::new(), constant(1)))
            .build();
        assert!(matches!(result, Err(BuildError::MissingEntry)));
    }

    #[test]
    fn test_build_rejects_cycle() {
        let result = ProgramBuilder::<i64>::new()
            .declare(Declaration::variable("a", ["b"], constant(1)))
            .declare(Declaration::variable("b", ["a"], constant(2)))
            .entry(|_, _| async { Ok(()) })
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Resolve(ResolveError::Cycle { members })) if members == vec!["a", "b", "a"]
        ));
    }
}
