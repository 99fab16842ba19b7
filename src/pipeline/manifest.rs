// src/pipeline/manifest.rs

//! Serializable summary of a finished run, stored next to the artifacts.

use serde::Serialize;

use crate::errors::Result;
use crate::pipeline::chapter::ChapterOutcome;
use crate::types::ProcessMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub title: String,
    pub mode: ProcessMode,
    /// Outline artifact key; absent when the outline stage never completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
    pub outline_attempts: u32,
    /// Kept last: TOML requires arrays of tables after plain keys.
    pub chapters: Vec<ChapterEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOutcome {
    Validated,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    pub number: u32,
    pub outcome: EntryOutcome,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ChapterEntry {
    pub fn from_outcome(number: u32, outcome: &ChapterOutcome) -> Self {
        match outcome {
            ChapterOutcome::Validated {
                artifact,
                attempts,
                words,
            } => Self {
                number,
                outcome: EntryOutcome::Validated,
                attempts: *attempts,
                words: Some(*words),
                artifact: Some(artifact.key().to_string()),
                reason: None,
            },
            ChapterOutcome::Aborted {
                attempts,
                last_failure,
            } => Self {
                number,
                outcome: EntryOutcome::Aborted,
                attempts: *attempts,
                words: None,
                artifact: None,
                reason: Some(
                    last_failure
                        .as_ref()
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "no attempts allowed".to_string()),
                ),
            },
        }
    }
}

impl Manifest {
    pub fn validated(&self) -> usize {
        self.chapters
            .iter()
            .filter(|c| c.outcome == EntryOutcome::Validated)
            .count()
    }

    pub fn aborted(&self) -> usize {
        self.chapters.len() - self.validated()
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}
