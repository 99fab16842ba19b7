// src/errors.rs

//! Crate-wide error types and aliases.
//!
//! Errors are split by how far they are allowed to travel:
//! - [`BuildError`], [`RoleNotFound`] and [`InvariantViolation`] are fatal and
//!   end the whole pipeline run.
//! - [`ExecutionError`] is transient; it is caught at the chapter boundary and
//!   turned into a retry.

use std::time::Duration;

use thiserror::Error;

use crate::dag::{RoleId, TaskId};

/// Failure to construct a [`crate::dag::TaskGraph`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("task graph has no tasks")]
    Empty,

    #[error("duplicate task id '{0}'")]
    DuplicateTask(TaskId),

    #[error("task '{task}' has unknown dependency '{dep}'")]
    UnknownDependency { task: TaskId, dep: TaskId },

    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(TaskId),

    #[error("cycle detected in task graph involving: {}", .0.join(", "))]
    Cycle(Vec<TaskId>),
}

/// A task's role has no registered worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no worker registered for role '{0}'")]
pub struct RoleNotFound(pub RoleId);

/// Internal consistency failure inside the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Result of a single worker invocation that did not produce text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("worker for role '{role}' timed out after {after:?}")]
    Timeout { role: RoleId, after: Duration },

    #[error("worker for role '{role}' failed: {message}")]
    Failure { role: RoleId, message: String },
}

/// Why a scheduler stopped walking a graph before every task completed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("task '{task}' failed: {source}")]
    Transient {
        task: TaskId,
        #[source]
        source: ExecutionError,
    },

    #[error(transparent)]
    RoleNotFound(#[from] RoleNotFound),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl StageError {
    /// Whether the failure may go away by re-running the stage.
    pub fn is_transient(&self) -> bool {
        matches!(self, StageError::Transient { .. })
    }
}

#[derive(Error, Debug)]
pub enum QuilldagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("{stage} stage: {source}")]
    Build {
        stage: String,
        #[source]
        source: BuildError,
    },

    #[error(transparent)]
    RoleNotFound(#[from] RoleNotFound),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, QuilldagError>;

impl From<StageError> for QuilldagError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::RoleNotFound(e) => QuilldagError::RoleNotFound(e),
            StageError::Invariant(e) => QuilldagError::Invariant(e),
            transient @ StageError::Transient { .. } => {
                QuilldagError::Other(anyhow::Error::new(transient))
            }
        }
    }
}
