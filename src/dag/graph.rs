// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, trace};

use crate::dag::task::{Task, TaskId, TaskSpec, TaskStatus};
use crate::errors::{BuildError, InvariantViolation};

/// Internal node structure: stores immediate deps and dependents by index.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies, deduplicated, in declaration order.
    deps: Vec<usize>,
    /// Direct dependents, in declaration order.
    dependents: Vec<usize>,
}

/// Acyclic graph of tasks for one pipeline stage.
///
/// Tasks are kept in declaration order; every tie in the engine (topological
/// order, ready set, hierarchical dispatch) is broken by that order.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    nodes: Vec<DagNode>,
    index: HashMap<TaskId, usize>,
    /// Stable topological order computed once at build time.
    order: Vec<usize>,
}

impl TaskGraph {
    /// Build and validate a graph from task specs.
    ///
    /// Fails if the list is empty, an id is declared twice, a dependency does
    /// not resolve inside this call, a task depends on itself, or the edges
    /// form a cycle.
    pub fn build(specs: Vec<TaskSpec>) -> Result<Self, BuildError> {
        if specs.is_empty() {
            return Err(BuildError::Empty);
        }

        let mut index: HashMap<TaskId, usize> = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(BuildError::DuplicateTask(spec.id.clone()));
            }
        }

        let mut nodes: Vec<DagNode> = (0..specs.len())
            .map(|_| DagNode {
                deps: Vec::new(),
                dependents: Vec::new(),
            })
            .collect();

        for (i, spec) in specs.iter().enumerate() {
            for dep in spec.after.iter() {
                if dep == &spec.id {
                    return Err(BuildError::SelfDependency(spec.id.clone()));
                }
                let Some(&d) = index.get(dep) else {
                    return Err(BuildError::UnknownDependency {
                        task: spec.id.clone(),
                        dep: dep.clone(),
                    });
                };
                if nodes[i].deps.contains(&d) {
                    debug!(task = %spec.id, dep = %dep, "ignoring repeated dependency");
                    continue;
                }
                nodes[i].deps.push(d);
                nodes[d].dependents.push(i);
            }
        }

        check_acyclic(&specs, &nodes)?;
        let order = stable_topological_order(&nodes);

        let tasks = specs.into_iter().map(Task::new).collect();
        Ok(Self {
            tasks,
            nodes,
            index,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks, in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn output_of(&self, id: &str) -> Option<&str> {
        self.task(id).and_then(|t| t.output())
    }

    /// Immediate dependencies of a task, as declared.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.task(id).map(|t| t.deps()).unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in `after`).
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        match self.index.get(id) {
            Some(&i) => self.nodes[i]
                .dependents
                .iter()
                .map(|&d| self.tasks[d].id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The fixed topological order; ties broken by declaration order.
    pub fn topological_order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&i| self.tasks[i].id())
    }

    /// Last task in topological order (the natural "compiled" output of a stage).
    pub fn sink(&self) -> &str {
        let last = self.order.last().copied().unwrap_or(0);
        self.tasks[last].id()
    }

    /// Distinct roles referenced by this graph.
    pub fn roles(&self) -> BTreeSet<&str> {
        self.tasks.iter().map(|t| t.role()).collect()
    }

    /// Whether every dependency of `id` is `Completed`.
    pub fn deps_completed(&self, id: &str) -> bool {
        match self.index.get(id) {
            Some(&i) => self.deps_completed_at(i),
            None => false,
        }
    }

    /// Promote `Pending` tasks whose dependencies are all `Completed` to
    /// `Ready`, and return every `Ready` task in declaration order.
    pub fn ready_tasks(&mut self) -> Vec<TaskId> {
        for i in 0..self.tasks.len() {
            if self.tasks[i].status == TaskStatus::Pending && self.deps_completed_at(i) {
                trace!(task = %self.tasks[i].id(), "dependencies completed; Ready");
                self.tasks[i].status = TaskStatus::Ready;
            }
        }

        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Ready)
            .map(|t| t.spec.id.clone())
            .collect()
    }

    /// `Ready -> Running`.
    pub fn mark_running(&mut self, id: &str) -> Result<(), InvariantViolation> {
        self.transition(id, TaskStatus::Ready, TaskStatus::Running)
    }

    /// `Running -> Completed`, storing the produced text.
    pub fn complete(&mut self, id: &str, output: String) -> Result<(), InvariantViolation> {
        self.transition(id, TaskStatus::Running, TaskStatus::Completed)?;
        if let Some(&i) = self.index.get(id) {
            self.tasks[i].output = Some(output);
        }
        Ok(())
    }

    /// `Running -> Failed`.
    pub fn fail(&mut self, id: &str) -> Result<(), InvariantViolation> {
        self.transition(id, TaskStatus::Running, TaskStatus::Failed)
    }

    /// True once every task is `Completed`.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    pub fn has_failed(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::Failed)
    }

    /// Put every task back to `Pending` and drop all outputs.
    pub fn reset(&mut self) {
        for task in self.tasks.iter_mut() {
            task.status = TaskStatus::Pending;
            task.output = None;
        }
        debug!(tasks = self.tasks.len(), "task graph reset");
    }

    fn deps_completed_at(&self, i: usize) -> bool {
        self.nodes[i]
            .deps
            .iter()
            .all(|&d| self.tasks[d].status == TaskStatus::Completed)
    }

    fn transition(
        &mut self,
        id: &str,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<(), InvariantViolation> {
        let &i = self
            .index
            .get(id)
            .ok_or_else(|| InvariantViolation(format!("unknown task '{id}'")))?;
        let task = &mut self.tasks[i];
        if task.status != from {
            return Err(InvariantViolation(format!(
                "task '{}' expected {:?} before {:?}, found {:?}",
                id, from, to, task.status
            )));
        }
        task.status = to;
        Ok(())
    }
}

fn check_acyclic(specs: &[TaskSpec], nodes: &[DagNode]) -> Result<(), BuildError> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..nodes.len() {
        graph.add_node(i);
    }
    for (i, node) in nodes.iter().enumerate() {
        for &d in node.deps.iter() {
            graph.add_edge(d, i, ());
        }
    }

    if toposort(&graph, None).is_ok() {
        return Ok(());
    }

    let mut members: Vec<usize> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .flatten()
        .collect();
    members.sort_unstable();

    Err(BuildError::Cycle(
        members.into_iter().map(|i| specs[i].id.clone()).collect(),
    ))
}

/// Kahn's algorithm, always taking the lowest declaration index available.
fn stable_topological_order(nodes: &[DagNode]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();
    let mut available: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, deg)| **deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(i)) = available.pop() {
        order.push(i);
        for &dependent in nodes[i].dependents.iter() {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                available.push(Reverse(dependent));
            }
        }
    }
    order
}
