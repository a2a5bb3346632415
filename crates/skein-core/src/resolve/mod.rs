//! Declaration graph resolver: dependency graph, initialization order, globals.

pub mod globals;
pub mod graph;
pub mod order;

pub use self::globals::{Globals, initialize};
pub use self::graph::DependencyGraph;
pub use self::order::{InitOrder, resolve};
