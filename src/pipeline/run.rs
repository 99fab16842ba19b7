// src/pipeline/run.rs

//! The outer pipeline: outline stage once, then each chapter unit in order.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::dag::{TaskGraph, TaskId};
use crate::engine::Scheduler;
use crate::errors::{InvariantViolation, QuilldagError, Result};
use crate::pipeline::artifact::{Artifact, ArtifactSink, MANIFEST_KEY};
use crate::pipeline::chapter::{ChapterOutcome, ChapterUnit, WordBounds};
use crate::pipeline::manifest::{ChapterEntry, Manifest};
use crate::pipeline::retry::{AttemptFailure, RetryPolicy};
use crate::pipeline::stage::{StageDefinition, TemplateVars};
use crate::worker::WorkerRegistry;

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub title: String,
    pub premise: String,
    pub chapters: u32,
    pub bounds: WordBounds,
    pub retry: RetryPolicy,
    pub outline: StageDefinition,
    /// Task whose output is the compiled outline. Defaults to the last task
    /// in the outline graph's topological order.
    pub compiled_task: Option<TaskId>,
    pub chapter: StageDefinition,
    /// Task whose output is validated and stored as the chapter text.
    pub writing_task: TaskId,
}

/// Per-chapter result kept in the run report.
#[derive(Debug, Clone)]
pub struct ChapterReport {
    pub number: u32,
    pub outcome: ChapterOutcome,
    pub failures: Vec<AttemptFailure>,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// `None` when the outline stage never completed.
    pub outline: Option<Artifact>,
    pub chapters: Vec<ChapterReport>,
    pub manifest: Manifest,
}

impl RunReport {
    pub fn chapter(&self, number: u32) -> Option<&ChapterReport> {
        self.chapters.iter().find(|c| c.number == number)
    }
}

enum OutlineOutcome {
    Compiled { artifact: Artifact, attempts: u32 },
    Exhausted { attempts: u32, reason: String },
}

#[derive(Debug)]
pub struct PipelineRun {
    config: PipelineConfig,
    registry: WorkerRegistry,
    scheduler: Box<dyn Scheduler>,
    sink: Arc<dyn ArtifactSink>,
}

impl PipelineRun {
    pub fn new(
        config: PipelineConfig,
        registry: WorkerRegistry,
        scheduler: Box<dyn Scheduler>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            config,
            registry,
            scheduler,
            sink,
        }
    }

    /// Execute the whole run.
    ///
    /// Aborted chapters are recorded and skipped. An outline stage that
    /// exhausts its attempts aborts every chapter but still writes the
    /// manifest. Build errors, unknown roles, invariant violations and
    /// artifact IO failures end the run with `Err`.
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        info!(
            title = %self.config.title,
            chapters = self.config.chapters,
            mode = %self.scheduler.mode(),
            "starting pipeline run"
        );

        self.sink.clear()?;

        let (outline, outline_attempts, chapters) = match self.run_outline().await? {
            OutlineOutcome::Compiled { artifact, attempts } => {
                self.sink.persist(artifact.key(), artifact.formatted())?;

                let mut chapters = Vec::with_capacity(self.config.chapters as usize);
                for number in 1..=self.config.chapters {
                    chapters.push(self.run_chapter(number, artifact.raw()).await?);
                }
                (Some(artifact), attempts, chapters)
            }
            OutlineOutcome::Exhausted { attempts, reason } => {
                warn!(
                    attempts,
                    %reason,
                    "outline stage exhausted its attempts; aborting every chapter"
                );
                let failure = AttemptFailure::OutlineUnavailable { attempts, reason };
                let chapters = (1..=self.config.chapters)
                    .map(|number| ChapterReport {
                        number,
                        outcome: ChapterOutcome::Aborted {
                            attempts: 0,
                            last_failure: Some(failure.clone()),
                        },
                        failures: Vec::new(),
                    })
                    .collect();
                (None, attempts, chapters)
            }
        };

        let manifest = Manifest {
            title: self.config.title.clone(),
            mode: self.scheduler.mode(),
            outline: outline.as_ref().map(|a| a.key().to_string()),
            outline_attempts,
            chapters: chapters
                .iter()
                .map(|c| ChapterEntry::from_outcome(c.number, &c.outcome))
                .collect(),
        };
        self.sink.persist(MANIFEST_KEY, &manifest.to_toml()?)?;

        info!(
            validated = manifest.validated(),
            aborted = manifest.aborted(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run finished"
        );

        Ok(RunReport {
            outline,
            chapters,
            manifest,
        })
    }

    fn vars<'a>(&'a self, outline: Option<&'a str>, chapter: Option<u32>) -> TemplateVars<'a> {
        TemplateVars {
            title: &self.config.title,
            premise: &self.config.premise,
            outline,
            chapter,
            chapters: self.config.chapters,
            min_words: self.config.bounds.min_words,
            max_words: self.config.bounds.max_words,
        }
    }

    async fn run_outline(&self) -> Result<OutlineOutcome> {
        let mut graph = self
            .config
            .outline
            .build(&self.vars(None, None))
            .map_err(|source| QuilldagError::Build {
                stage: "outline".to_string(),
                source,
            })?;
        self.registry.check_roles(&graph)?;

        let policy = self.config.retry;
        let mut attempts = 0;
        let mut last_failure: Option<AttemptFailure> = None;

        while policy.allows_another(attempts) {
            if attempts > 0 {
                graph.reset();
            }
            attempts += 1;
            info!(attempt = attempts, tasks = graph.len(), "running outline stage");

            match self.scheduler.run(&mut graph, &self.registry).await {
                Ok(report) => {
                    debug!(
                        dispatched = ?report.dispatched,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "outline stage completed"
                    );
                    let text = self.compiled_outline(&graph)?;
                    return Ok(OutlineOutcome::Compiled {
                        artifact: Artifact::outline(text),
                        attempts,
                    });
                }
                Err(err) if err.is_transient() => {
                    let failure = AttemptFailure::Transient(err.to_string());
                    warn!(attempt = attempts, reason = %failure, "outline attempt failed");

                    let delay = policy.delay_after(&failure);
                    last_failure = Some(failure);
                    if policy.allows_another(attempts) && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(OutlineOutcome::Exhausted {
            attempts,
            reason: last_failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no attempts allowed".to_string()),
        })
    }

    fn compiled_outline(&self, graph: &TaskGraph) -> Result<String> {
        let id = self.config.compiled_task.as_deref().unwrap_or(graph.sink());
        let text = graph.output_of(id).ok_or_else(|| {
            InvariantViolation(format!("outline task '{id}' has no output after a complete run"))
        })?;
        Ok(text.to_string())
    }

    async fn run_chapter(&self, number: u32, outline: &str) -> Result<ChapterReport> {
        let graph = self
            .config
            .chapter
            .build(&self.vars(Some(outline), Some(number)))
            .map_err(|source| QuilldagError::Build {
                stage: format!("chapter {number}"),
                source,
            })?;
        self.registry.check_roles(&graph)?;

        let mut unit = ChapterUnit::new(
            number,
            graph,
            self.config.writing_task.clone(),
            self.config.bounds,
            self.config.retry,
        )?;

        let outcome = unit
            .run(self.scheduler.as_ref(), &self.registry, &self.config.title)
            .await?;

        match outcome.artifact() {
            Some(artifact) => self.sink.persist(artifact.key(), artifact.formatted())?,
            None => warn!(
                chapter = number,
                attempts = outcome.attempts(),
                "chapter aborted; continuing with the next chapter"
            ),
        }

        Ok(ChapterReport {
            number,
            outcome,
            failures: unit.failures().to_vec(),
        })
    }
}
