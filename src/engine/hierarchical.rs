// src/engine/hierarchical.rs

use std::collections::HashSet;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dag::{RoleId, TaskGraph, TaskId};
use crate::engine::dispatch::{prepare, record};
use crate::engine::{Scheduler, StageFuture, StageReport};
use crate::errors::{ExecutionError, InvariantViolation, StageError};
use crate::types::ProcessMode;
use crate::worker::WorkerRegistry;

/// Coordinating element of the hierarchical strategy.
///
/// Decides which ready tasks to dispatch in a round: walking the ready set in
/// declaration order, it picks every task whose role is idle and not already
/// picked this round. Everything else stays `Ready` for a later round.
#[derive(Debug, Default)]
pub struct Manager {
    busy: HashSet<RoleId>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self, role: &str) -> bool {
        self.busy.contains(role)
    }

    pub fn in_flight(&self) -> usize {
        self.busy.len()
    }

    /// Choose the tasks to dispatch now. `ready` must be in declaration order.
    pub fn select(&self, graph: &TaskGraph, ready: &[TaskId]) -> Vec<TaskId> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut picks = Vec::new();

        for id in ready {
            let Some(task) = graph.task(id) else {
                continue;
            };
            let role = task.role();
            if self.busy.contains(role) || !claimed.insert(role) {
                debug!(task = %id, role = %role, "role busy; task stays Ready");
                continue;
            }
            picks.push(id.clone());
        }

        picks
    }

    fn acquire(&mut self, role: &str) {
        self.busy.insert(role.to_string());
    }

    fn release(&mut self, role: &str) {
        self.busy.remove(role);
    }
}

/// Dispatches ready tasks concurrently, one in-flight invocation per role.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicalScheduler;

impl Scheduler for HierarchicalScheduler {
    fn mode(&self) -> ProcessMode {
        ProcessMode::Hierarchical
    }

    fn run<'a>(&'a self, graph: &'a mut TaskGraph, registry: &'a WorkerRegistry) -> StageFuture<'a> {
        Box::pin(run_hierarchical(graph, registry))
    }
}

type Finished = (TaskId, RoleId, Result<String, ExecutionError>);

async fn run_hierarchical(
    graph: &mut TaskGraph,
    registry: &WorkerRegistry,
) -> Result<StageReport, StageError> {
    registry.check_roles(graph)?;

    let started = Instant::now();
    let mut report = StageReport::default();
    let mut manager = Manager::new();
    let mut in_flight: JoinSet<Finished> = JoinSet::new();
    // First error wins; once set, nothing new is dispatched and the loop only
    // drains outstanding invocations.
    let mut failure: Option<StageError> = None;

    loop {
        if failure.is_none() {
            if let Err(err) = dispatch_round(graph, registry, &mut manager, &mut in_flight, &mut report)
            {
                failure = Some(err);
            }
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };

        match joined {
            Ok((id, role, result)) => {
                manager.release(&role);
                let outcome = record(graph, &id, result);
                match outcome {
                    Ok(()) => report.completed.push(id),
                    Err(err) if failure.is_none() => failure = Some(err),
                    Err(err) => {
                        debug!(task = %id, error = %err, "additional failure while draining");
                    }
                }
            }
            Err(join_err) => {
                warn!(error = %join_err, "worker invocation task did not finish");
                if failure.is_none() {
                    failure = Some(
                        InvariantViolation(format!("worker invocation aborted: {join_err}")).into(),
                    );
                }
            }
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }

    if !graph.is_complete() {
        return Err(InvariantViolation(
            "hierarchical walk stalled with tasks not Completed".to_string(),
        )
        .into());
    }

    report.elapsed = started.elapsed();
    Ok(report)
}

fn dispatch_round(
    graph: &mut TaskGraph,
    registry: &WorkerRegistry,
    manager: &mut Manager,
    in_flight: &mut JoinSet<Finished>,
    report: &mut StageReport,
) -> Result<(), StageError> {
    let ready = graph.ready_tasks();
    let picks = manager.select(graph, &ready);

    for id in picks {
        let scheduled = prepare(graph, &id)?;
        let worker = registry.resolve(&scheduled.role)?.clone();
        let timeout = registry.timeout();

        info!(task = %id, role = %scheduled.role, "manager dispatching task");
        manager.acquire(&scheduled.role);
        report.dispatched.push(id);

        in_flight.spawn(async move {
            let result = worker
                .invoke(&scheduled.description, &scheduled.context, timeout)
                .await;
            (scheduled.id, scheduled.role, result)
        });
    }

    report.peak_in_flight = report.peak_in_flight.max(manager.in_flight());
    Ok(())
}
