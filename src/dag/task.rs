// src/dag/task.rs

//! Task definitions and per-run task state.

/// Canonical task identifier type used throughout the engine.
pub type TaskId = String;

/// Stable identifier of the worker role a task is bound to.
pub type RoleId = String;

/// Lifecycle status of a task inside one graph instance.
///
/// Moves forward only (`Pending -> Ready -> Running -> Completed | Failed`),
/// except for [`crate::dag::TaskGraph::reset`] which puts everything back to
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting on at least one dependency.
    Pending,
    /// Every dependency is `Completed`; may be dispatched.
    Ready,
    /// Dispatched to a worker, invocation in flight.
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Declarative description of a task, as handed to [`crate::dag::TaskGraph::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub role: RoleId,
    /// Direct dependencies, in declaration order.
    pub after: Vec<TaskId>,
    /// Opaque payload passed to the worker.
    pub description: String,
}

impl TaskSpec {
    pub fn new(id: impl Into<TaskId>, role: impl Into<RoleId>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            after: Vec::new(),
            description: String::new(),
        }
    }

    pub fn after(mut self, dep: impl Into<TaskId>) -> Self {
        self.after.push(dep.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A task inside a built graph: its spec plus mutable run state.
#[derive(Debug, Clone)]
pub struct Task {
    pub spec: TaskSpec,
    pub(crate) status: TaskStatus,
    pub(crate) output: Option<String>,
}

impl Task {
    pub(crate) fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            status: TaskStatus::Pending,
            output: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn role(&self) -> &str {
        &self.spec.role
    }

    pub fn deps(&self) -> &[TaskId] {
        &self.spec.after
    }

    pub fn description(&self) -> &str {
        &self.spec.description
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Produced text; only present once the task is `Completed`.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }
}

/// Description of a task the scheduler wants a worker to run now.
///
/// Carries everything needed for the invocation so it can be moved into a
/// spawned future without borrowing the graph.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub role: RoleId,
    pub description: String,
    pub context: crate::dag::ContextBundle,
}
