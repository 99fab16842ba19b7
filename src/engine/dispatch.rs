// src/engine/dispatch.rs

//! Task dispatch and completion handling shared by both schedulers.

use tracing::{debug, info, warn};

use crate::dag::{aggregate, ScheduledTask, TaskGraph};
use crate::errors::{ExecutionError, InvariantViolation, StageError};

/// Build the invocation for a `Ready` task and mark it `Running`.
///
/// The context bundle is aggregated before the status changes, so an early
/// dispatch surfaces as an invariant violation rather than a bad prompt.
pub(crate) fn prepare(graph: &mut TaskGraph, id: &str) -> Result<ScheduledTask, InvariantViolation> {
    let context = aggregate(id, graph)?;
    graph.mark_running(id)?;

    let task = graph
        .task(id)
        .ok_or_else(|| InvariantViolation(format!("dispatched unknown task '{id}'")))?;

    debug!(
        task = %id,
        role = %task.role(),
        context = ?context.ids(),
        "dependencies completed; marking Running"
    );

    Ok(ScheduledTask {
        id: task.id().to_string(),
        role: task.role().to_string(),
        description: task.description().to_string(),
        context,
    })
}

/// Apply an invocation result to the graph.
///
/// Success completes the task; an execution error fails it and is returned as
/// a transient stage error so the caller stops walking the graph.
pub(crate) fn record(
    graph: &mut TaskGraph,
    id: &str,
    result: Result<String, ExecutionError>,
) -> Result<(), StageError> {
    match result {
        Ok(text) => {
            graph.complete(id, text)?;
            info!(task = %id, "task completed");
            Ok(())
        }
        Err(source) => {
            graph.fail(id)?;
            warn!(task = %id, error = %source, "task failed; stopping graph walk");
            Err(StageError::Transient {
                task: id.to_string(),
                source,
            })
        }
    }
}
