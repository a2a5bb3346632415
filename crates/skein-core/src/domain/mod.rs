//! Domain model (IDs, task states, errors, declarations).

pub mod declaration;
pub mod errors;
pub mod ids;
pub mod state;

pub use declaration::{DeclHeader, DeclKind, Declaration, Initializer};
pub use errors::{InitError, ResolveError, SyncError, TaskError};
pub use ids::{BarrierId, ChannelId, MutexId, RunId, TaskId};
pub use state::{BlockReason, TaskOutcome, TaskState};
