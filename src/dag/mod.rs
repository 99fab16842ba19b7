// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`task`] holds task specs, statuses and the dispatch description.
//! - [`graph`] holds the validated acyclic graph for one stage plus its
//!   per-run task state.
//! - [`context`] builds the ordered dependency context for an invocation.

pub mod context;
pub mod graph;
pub mod task;

pub use context::{aggregate, ContextBundle};
pub use graph::TaskGraph;
pub use task::{RoleId, ScheduledTask, Task, TaskId, TaskSpec, TaskStatus};
