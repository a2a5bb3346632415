//! Synchronization primitives shared between tasks.
//!
//! Every primitive is a cheap handle around shared state; cloning it shares
//! the same channel / lock / counter, it never copies one. Blocking operations
//! take the calling task's [`Cx`](crate::sched::Cx).

pub mod barrier;
pub mod channel;
pub mod mutex;
pub mod select;

pub use self::barrier::Barrier;
pub use self::channel::{Channel, TryRecvError, TrySendError};
pub use self::mutex::Mutex;
pub use self::select::Select;
