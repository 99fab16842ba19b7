// src/pipeline/chapter.rs

//! Retry-scoped execution of one chapter's task graph.

use tracing::{debug, info, warn};

use crate::dag::{TaskGraph, TaskId};
use crate::engine::Scheduler;
use crate::errors::{InvariantViolation, StageError};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::retry::{AttemptFailure, RetryPolicy};
use crate::validation::{validate, Verdict};
use crate::worker::WorkerRegistry;

/// Word bounds for a chapter's writing task. Not cross-checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBounds {
    pub min_words: usize,
    pub max_words: usize,
}

/// Where a chapter unit is in its retry state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterState {
    Building,
    Running,
    Retrying,
    Validated,
    Aborted,
}

impl ChapterState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChapterState::Validated | ChapterState::Aborted)
    }
}

/// Terminal result of a chapter unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    Validated {
        artifact: Artifact,
        attempts: u32,
        words: usize,
    },
    Aborted {
        attempts: u32,
        /// Failure of the final attempt; `None` when no attempt was allowed.
        last_failure: Option<AttemptFailure>,
    },
}

impl ChapterOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ChapterOutcome::Validated { attempts, .. } | ChapterOutcome::Aborted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            ChapterOutcome::Validated { artifact, .. } => Some(artifact),
            ChapterOutcome::Aborted { .. } => None,
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, ChapterOutcome::Validated { .. })
    }
}

/// One chapter: its graph, bounds, and attempt counter.
#[derive(Debug)]
pub struct ChapterUnit {
    number: u32,
    graph: TaskGraph,
    writing_task: TaskId,
    bounds: WordBounds,
    policy: RetryPolicy,
    attempts: u32,
    state: ChapterState,
    failures: Vec<AttemptFailure>,
}

impl ChapterUnit {
    /// Wrap an already-built chapter graph. `writing_task` names the task
    /// whose output is validated and captured.
    pub fn new(
        number: u32,
        graph: TaskGraph,
        writing_task: impl Into<TaskId>,
        bounds: WordBounds,
        policy: RetryPolicy,
    ) -> Result<Self, InvariantViolation> {
        let writing_task = writing_task.into();
        if !graph.contains(&writing_task) {
            return Err(InvariantViolation(format!(
                "chapter {number}: writing task '{writing_task}' is not in the chapter graph"
            )));
        }

        Ok(Self {
            number,
            graph,
            writing_task,
            bounds,
            policy,
            attempts: 0,
            state: ChapterState::Building,
            failures: Vec::new(),
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn state(&self) -> ChapterState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Failures of every unsuccessful attempt so far, oldest first.
    pub fn failures(&self) -> &[AttemptFailure] {
        &self.failures
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Drive the unit to a terminal outcome.
    ///
    /// Validation rejections and transient scheduler failures are retried
    /// (whole graph reset) until the attempt cap; only fatal errors
    /// (unknown role, engine invariant) are returned as `Err`.
    pub async fn run(
        &mut self,
        scheduler: &dyn Scheduler,
        registry: &WorkerRegistry,
        title: &str,
    ) -> Result<ChapterOutcome, StageError> {
        while self.policy.allows_another(self.attempts) {
            if self.attempts > 0 {
                self.graph.reset();
            }
            self.attempts += 1;
            self.state = ChapterState::Running;
            info!(
                chapter = self.number,
                attempt = self.attempts,
                max_attempts = self.policy.max_attempts,
                "running chapter graph"
            );

            let failure = match scheduler.run(&mut self.graph, registry).await {
                Ok(report) => {
                    debug!(
                        chapter = self.number,
                        dispatched = ?report.dispatched,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "chapter graph completed"
                    );
                    let text = self
                        .graph
                        .output_of(&self.writing_task)
                        .ok_or_else(|| {
                            InvariantViolation(format!(
                                "chapter {}: writing task '{}' has no output after a complete run",
                                self.number, self.writing_task
                            ))
                        })?
                        .to_string();

                    match validate(&text, self.bounds.min_words, self.bounds.max_words) {
                        Verdict::Accept(words) => {
                            self.state = ChapterState::Validated;
                            info!(
                                chapter = self.number,
                                attempts = self.attempts,
                                words,
                                "chapter validated"
                            );
                            return Ok(ChapterOutcome::Validated {
                                artifact: Artifact::chapter(self.number, text, title),
                                attempts: self.attempts,
                                words,
                            });
                        }
                        Verdict::Reject(words) => AttemptFailure::TooShort {
                            words,
                            min_words: self.bounds.min_words,
                        },
                    }
                }
                Err(err) if err.is_transient() => AttemptFailure::Transient(err.to_string()),
                Err(err) => return Err(err),
            };

            self.state = ChapterState::Retrying;
            warn!(
                chapter = self.number,
                attempt = self.attempts,
                reason = %failure,
                "chapter attempt rejected"
            );

            let delay = self.policy.delay_after(&failure);
            self.failures.push(failure);

            if self.policy.allows_another(self.attempts) && !delay.is_zero() {
                debug!(chapter = self.number, ?delay, "waiting before retry");
                tokio::time::sleep(delay).await;
            }
        }

        self.state = ChapterState::Aborted;
        warn!(
            chapter = self.number,
            attempts = self.attempts,
            "chapter aborted; attempts exhausted"
        );
        Ok(ChapterOutcome::Aborted {
            attempts: self.attempts,
            last_failure: self.failures.last().cloned(),
        })
    }
}
