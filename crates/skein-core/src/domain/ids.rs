//! Domain identifiers (strongly-typed IDs).
//!
//! # Phantom Type パターン
//! `Id<T>` というジェネリック型で共通実装を提供しつつ、
//! `T` はマーカー型として使い、`TaskId` と `ChannelId` などを型で区別します。
//!
//! タスクや同期プリミティブの ID はプロセス内の連番です（レポートで読みやすく、
//! 生成順に並ぶ）。1 回の実行を表す `RunId` だけは ULID を使います。

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "task-", "chan-"）
    fn prefix() -> &'static str;

    /// 連番の発行元
    fn counter() -> &'static AtomicU64;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    seq: u64,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// 次の ID を発行する（スレッドセーフ）
    pub fn next() -> Self {
        Self::from_seq(T::counter().fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_seq(seq: u64) -> Self {
        Self {
            seq,
            _marker: PhantomData,
        }
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.seq)
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }

            fn counter() -> &'static AtomicU64 {
                static NEXT: AtomicU64 = AtomicU64::new(1);
                &NEXT
            }
        }
    };
}

id_marker!(
    /// Task のマーカー型
    Task,
    "task-"
);
id_marker!(
    /// Channel のマーカー型
    Channel,
    "chan-"
);
id_marker!(
    /// Mutex のマーカー型
    Mutex,
    "mutex-"
);
id_marker!(
    /// Barrier のマーカー型
    Barrier,
    "barrier-"
);

/// Identifier of a scheduled task.
pub type TaskId = Id<Task>;

/// Identifier of a channel.
pub type ChannelId = Id<Channel>;

/// Identifier of a mutex.
pub type MutexId = Id<Mutex>;

/// Identifier of a join barrier.
pub type BarrierId = Id<Barrier>;

/// Identifier of one scheduler run (ULID: 時刻でソート可能).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}
