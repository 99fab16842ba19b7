// src/pipeline/mod.rs

//! Book production on top of the engine: an outline stage whose compiled text
//! feeds a sequence of independently retried chapter units.

pub mod artifact;
pub mod chapter;
pub mod manifest;
pub mod retry;
pub mod run;
pub mod stage;

pub use artifact::{Artifact, ArtifactKind, ArtifactSink, FsArtifactSink};
pub use chapter::{ChapterOutcome, ChapterState, ChapterUnit, WordBounds};
pub use manifest::{ChapterEntry, EntryOutcome, Manifest};
pub use retry::{AttemptFailure, RetryPolicy};
pub use run::{ChapterReport, PipelineConfig, PipelineRun, RunReport};
pub use stage::{StageDefinition, TaskTemplate, TemplateVars};
