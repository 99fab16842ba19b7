// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::{RoleId, TaskId};
use crate::pipeline::{PipelineConfig, RetryPolicy, StageDefinition, TaskTemplate, WordBounds};
use crate::types::ProcessMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// title = "The Lighthouse"
/// premise = "A keeper finds a door in the lamp room"
/// chapters = 3
/// mode = "hierarchical"
///
/// [role.researcher]
/// cmd = "llm -m local research"
///
/// [outline]
/// compiled_task = "outline"
///
/// [[outline.task]]
/// id = "outline"
/// role = "researcher"
/// description = "Outline {chapters} chapters for: {premise}"
///
/// [chapter]
/// writing_task = "write"
///
/// [[chapter.task]]
/// id = "write"
/// role = "writer"
/// description = "Write chapter {chapter} using:\n{outline}"
/// ```
///
/// This is the unvalidated form; use [`ConfigFile::try_from`] to check it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,

    /// Workers from `[role.<id>]`, keyed by role id.
    #[serde(default)]
    pub role: BTreeMap<RoleId, RoleConfig>,

    #[serde(default)]
    pub outline: OutlineSection,

    #[serde(default)]
    pub chapter: ChapterSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub premise: String,

    #[serde(default = "default_chapters")]
    pub chapters: u32,

    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Advisory only; longer chapters are accepted with a warning.
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Attempts per stage, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-invocation deadline, e.g. `"300s"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Pause before retrying after a timeout or worker failure.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    #[serde(default)]
    pub mode: ProcessMode,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_title() -> String {
    "Untitled".to_string()
}

fn default_chapters() -> u32 {
    3
}

fn default_min_words() -> usize {
    1600
}

fn default_max_words() -> usize {
    3000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout() -> String {
    "300s".to_string()
}

fn default_retry_delay() -> String {
    "5s".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            premise: String::new(),
            chapters: default_chapters(),
            min_words: default_min_words(),
            max_words: default_max_words(),
            max_attempts: default_max_attempts(),
            timeout: default_timeout(),
            retry_delay: default_retry_delay(),
            mode: ProcessMode::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// `[role.<id>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoleConfig {
    /// Shell command run once per invocation. The prompt arrives on stdin,
    /// the produced text is read from stdout.
    pub cmd: String,
}

/// `[outline]` section with its `[[outline.task]]` entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutlineSection {
    /// Task whose output becomes the shared outline; defaults to the last
    /// task in topological order.
    #[serde(default)]
    pub compiled_task: Option<TaskId>,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskTemplate>,
}

/// `[chapter]` section with its `[[chapter.task]]` entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterSection {
    /// Task whose output is validated and stored. Required.
    #[serde(default)]
    pub writing_task: Option<TaskId>,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskTemplate>,
}

/// `[run]` after validation, with durations parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub title: String,
    pub premise: String,
    pub chapters: u32,
    pub min_words: usize,
    pub max_words: usize,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub mode: ProcessMode,
    pub output_dir: PathBuf,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSettings,
    pub role: BTreeMap<RoleId, RoleConfig>,
    pub outline: StageDefinition,
    pub compiled_task: Option<TaskId>,
    pub chapter: StageDefinition,
    pub writing_task: TaskId,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run: RunSettings,
        role: BTreeMap<RoleId, RoleConfig>,
        outline: OutlineSection,
        chapter: ChapterSection,
        writing_task: TaskId,
    ) -> Self {
        Self {
            run,
            role,
            outline: StageDefinition::new(outline.tasks),
            compiled_task: outline.compiled_task,
            chapter: StageDefinition::new(chapter.tasks),
            writing_task,
        }
    }

    /// The engine-facing view of this configuration.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            title: self.run.title.clone(),
            premise: self.run.premise.clone(),
            chapters: self.run.chapters,
            bounds: WordBounds {
                min_words: self.run.min_words,
                max_words: self.run.max_words,
            },
            retry: RetryPolicy::new(self.run.max_attempts, self.run.retry_delay),
            outline: self.outline.clone(),
            compiled_task: self.compiled_task.clone(),
            chapter: self.chapter.clone(),
            writing_task: self.writing_task.clone(),
        }
    }
}
