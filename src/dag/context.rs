// src/dag/context.rs

//! Context aggregation: the dependency outputs a task is invoked with.

use std::fmt::Write as _;

use crate::dag::graph::TaskGraph;
use crate::dag::task::{TaskId, TaskStatus};
use crate::errors::InvariantViolation;

/// Ordered dependency outputs for one invocation.
///
/// Entries follow the task's declared `after` order, never the order in which
/// dependencies finished. Built fresh per execution and not mutated after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    entries: Vec<(TaskId, String)>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, v)| v.as_str())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Plain-text rendering, one labelled section per dependency.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (id, text) in self.entries.iter() {
            let _ = writeln!(out, "### {id}");
            out.push_str(text.trim_end());
            out.push_str("\n\n");
        }
        out
    }
}

/// Build the context bundle for `task_id` from its dependencies' outputs.
///
/// Every dependency must already be `Completed`; anything else means the
/// scheduler dispatched too early.
pub fn aggregate(task_id: &str, graph: &TaskGraph) -> Result<ContextBundle, InvariantViolation> {
    let task = graph
        .task(task_id)
        .ok_or_else(|| InvariantViolation(format!("context requested for unknown task '{task_id}'")))?;

    let mut entries: Vec<(TaskId, String)> = Vec::with_capacity(task.deps().len());
    for dep in task.deps() {
        if entries.iter().any(|(k, _)| k == dep) {
            continue;
        }
        let dep_task = graph.task(dep).ok_or_else(|| {
            InvariantViolation(format!("task '{task_id}' depends on unknown task '{dep}'"))
        })?;
        match (dep_task.status(), dep_task.output()) {
            (TaskStatus::Completed, Some(output)) => {
                entries.push((dep.clone(), output.to_string()));
            }
            (status, _) => {
                return Err(InvariantViolation(format!(
                    "task '{task_id}' aggregated before dependency '{dep}' completed (status {status:?})"
                )));
            }
        }
    }

    Ok(ContextBundle { entries })
}
