// src/engine/sequential.rs

use std::time::Instant;

use tracing::{debug, info};

use crate::dag::{TaskGraph, TaskId};
use crate::engine::dispatch::{prepare, record};
use crate::engine::{Scheduler, StageFuture, StageReport};
use crate::errors::{InvariantViolation, StageError};
use crate::types::ProcessMode;
use crate::worker::WorkerRegistry;

/// Executes tasks strictly one at a time in the graph's topological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialScheduler;

impl Scheduler for SequentialScheduler {
    fn mode(&self) -> ProcessMode {
        ProcessMode::Sequential
    }

    fn run<'a>(&'a self, graph: &'a mut TaskGraph, registry: &'a WorkerRegistry) -> StageFuture<'a> {
        Box::pin(run_sequential(graph, registry))
    }
}

async fn run_sequential(
    graph: &mut TaskGraph,
    registry: &WorkerRegistry,
) -> Result<StageReport, StageError> {
    registry.check_roles(graph)?;

    let started = Instant::now();
    let order: Vec<TaskId> = graph.topological_order().map(str::to_string).collect();
    debug!(?order, "sequential walk");

    let mut report = StageReport::default();

    for id in order {
        let ready = graph.ready_tasks();
        if !ready.contains(&id) {
            return Err(InvariantViolation(format!(
                "task '{id}' reached in topological order but is not Ready"
            ))
            .into());
        }

        let scheduled = prepare(graph, &id)?;
        let worker = registry.resolve(&scheduled.role)?;

        info!(task = %id, role = %scheduled.role, "dispatching task");
        report.dispatched.push(id.clone());
        report.peak_in_flight = 1;

        let result = worker
            .invoke(&scheduled.description, &scheduled.context, registry.timeout())
            .await;

        record(graph, &id, result)?;
        report.completed.push(id);
    }

    report.elapsed = started.elapsed();
    Ok(report)
}
