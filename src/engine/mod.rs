// src/engine/mod.rs

//! Schedulers that walk a [`TaskGraph`] and drive workers.
//!
//! Both strategies implement [`Scheduler`] and consume the same graph and
//! [`WorkerRegistry`]:
//! - [`sequential`] runs one task at a time in the graph's stable
//!   topological order.
//! - [`hierarchical`] lets a [`Manager`] dispatch every ready task whose role
//!   is idle, so independent branches overlap.
//!
//! Shared dispatch/completion handling lives in [`dispatch`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::dag::{TaskGraph, TaskId};
use crate::errors::StageError;
use crate::types::ProcessMode;
use crate::worker::WorkerRegistry;

pub mod dispatch;
pub mod hierarchical;
pub mod sequential;

pub use hierarchical::{HierarchicalScheduler, Manager};
pub use sequential::SequentialScheduler;

/// Boxed future returned by [`Scheduler::run`].
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<StageReport, StageError>> + Send + 'a>>;

/// Strategy that executes every task of a graph, respecting dependencies.
///
/// On success every task is `Completed`. On a worker timeout or failure the
/// task is marked `Failed` and a transient [`StageError`] is returned; no
/// invocation is left in flight when the future resolves.
pub trait Scheduler: Send + Sync + fmt::Debug {
    fn mode(&self) -> ProcessMode;

    fn run<'a>(&'a self, graph: &'a mut TaskGraph, registry: &'a WorkerRegistry) -> StageFuture<'a>;
}

/// Construct the scheduler for a configured mode.
pub fn scheduler_for(mode: ProcessMode) -> Box<dyn Scheduler> {
    match mode {
        ProcessMode::Sequential => Box::new(SequentialScheduler),
        ProcessMode::Hierarchical => Box::new(HierarchicalScheduler),
    }
}

/// What happened during one successful walk of a graph.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    /// Task ids in the order they were dispatched.
    pub dispatched: Vec<TaskId>,
    /// Task ids in the order they completed.
    pub completed: Vec<TaskId>,
    /// Largest number of simultaneously in-flight invocations.
    pub peak_in_flight: usize,
    pub elapsed: Duration,
}
