#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use quilldag::config::{
    ChapterSection, ConfigFile, OutlineSection, RawConfigFile, RoleConfig, RunSection,
};
use quilldag::dag::{TaskGraph, TaskSpec};
use quilldag::errors::Result;
use quilldag::pipeline::{
    PipelineConfig, RetryPolicy, StageDefinition, TaskTemplate, WordBounds,
};

/// Task template shorthand.
pub fn template(id: &str, role: &str, after: &[&str], description: &str) -> TaskTemplate {
    TaskTemplate {
        id: id.to_string(),
        role: role.to_string(),
        after: after.iter().map(|s| s.to_string()).collect(),
        description: description.to_string(),
    }
}

/// Build a graph from `(id, role, after)` triples; the description is the id.
pub fn graph(tasks: &[(&str, &str, &[&str])]) -> TaskGraph {
    TaskGraph::build(specs(tasks)).expect("Failed to build graph from builder")
}

pub fn specs(tasks: &[(&str, &str, &[&str])]) -> Vec<TaskSpec> {
    tasks
        .iter()
        .map(|(id, role, after)| {
            after
                .iter()
                .fold(TaskSpec::new(*id, *role), |spec, dep| spec.after(*dep))
                .description(*id)
        })
        .collect()
}

/// Builder for `PipelineConfig`.
///
/// Defaults: one chapter, 100..300 words, 3 attempts without delay, a single
/// `outline` task for role `planner` and a single `write` task for role
/// `writer`.
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig {
                title: "Test Book".to_string(),
                premise: "a lighthouse keeper".to_string(),
                chapters: 1,
                bounds: WordBounds {
                    min_words: 100,
                    max_words: 300,
                },
                retry: RetryPolicy::new(3, Duration::ZERO),
                outline: StageDefinition::new(vec![template(
                    "outline",
                    "planner",
                    &[],
                    "outline: {premise}",
                )]),
                compiled_task: None,
                chapter: StageDefinition::new(vec![template(
                    "write",
                    "writer",
                    &[],
                    "write {chapter}",
                )]),
                writing_task: "write".to_string(),
            },
        }
    }

    pub fn chapters(mut self, n: u32) -> Self {
        self.config.chapters = n;
        self
    }

    pub fn bounds(mut self, min_words: usize, max_words: usize) -> Self {
        self.config.bounds = WordBounds {
            min_words,
            max_words,
        };
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.transient_delay = delay;
        self
    }

    pub fn outline(mut self, tasks: Vec<TaskTemplate>) -> Self {
        self.config.outline = StageDefinition::new(tasks);
        self
    }

    pub fn compiled_task(mut self, id: &str) -> Self {
        self.config.compiled_task = Some(id.to_string());
        self
    }

    pub fn chapter(mut self, tasks: Vec<TaskTemplate>, writing_task: &str) -> Self {
        self.config.chapter = StageDefinition::new(tasks);
        self.config.writing_task = writing_task.to_string();
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from a valid config with roles `planner` and `writer`; `build`
/// returns the validation result so error cases can be asserted.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut role = BTreeMap::new();
        role.insert(
            "planner".to_string(),
            RoleConfig {
                cmd: "cat".to_string(),
            },
        );
        role.insert(
            "writer".to_string(),
            RoleConfig {
                cmd: "cat".to_string(),
            },
        );

        Self {
            config: RawConfigFile {
                run: RunSection::default(),
                role,
                outline: OutlineSection {
                    compiled_task: None,
                    tasks: vec![template("outline", "planner", &[], "outline {premise}")],
                },
                chapter: ChapterSection {
                    writing_task: Some("write".to_string()),
                    tasks: vec![template("write", "writer", &[], "write {chapter}")],
                },
            },
        }
    }

    pub fn run(mut self, f: impl FnOnce(&mut RunSection)) -> Self {
        f(&mut self.config.run);
        self
    }

    pub fn role(mut self, name: &str, cmd: &str) -> Self {
        self.config.role.insert(
            name.to_string(),
            RoleConfig {
                cmd: cmd.to_string(),
            },
        );
        self
    }

    pub fn without_role(mut self, name: &str) -> Self {
        self.config.role.remove(name);
        self
    }

    pub fn outline_tasks(mut self, tasks: Vec<TaskTemplate>) -> Self {
        self.config.outline.tasks = tasks;
        self
    }

    pub fn compiled_task(mut self, id: &str) -> Self {
        self.config.outline.compiled_task = Some(id.to_string());
        self
    }

    pub fn chapter_tasks(mut self, tasks: Vec<TaskTemplate>) -> Self {
        self.config.chapter.tasks = tasks;
        self
    }

    pub fn writing_task(mut self, id: Option<&str>) -> Self {
        self.config.chapter.writing_task = id.map(str::to_string);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
