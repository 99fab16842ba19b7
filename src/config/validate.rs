// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile, RoleConfig, RunSection, RunSettings};
use crate::dag::RoleId;
use crate::errors::{QuilldagError, Result};
use crate::pipeline::{StageDefinition, TaskTemplate, TemplateVars};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = QuilldagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let run = validate_run(&raw.run)?;
        ensure_has_tasks("outline", &raw.outline.tasks)?;
        ensure_has_tasks("chapter", &raw.chapter.tasks)?;
        validate_roles(&raw.role)?;
        validate_task_roles("outline", &raw.outline.tasks, &raw.role)?;
        validate_task_roles("chapter", &raw.chapter.tasks, &raw.role)?;
        validate_dag("outline", &raw.outline.tasks)?;
        validate_dag("chapter", &raw.chapter.tasks)?;

        if let Some(ref compiled) = raw.outline.compiled_task {
            if !raw.outline.tasks.iter().any(|t| &t.id == compiled) {
                return Err(QuilldagError::ConfigError(format!(
                    "[outline].compiled_task '{compiled}' is not an outline task"
                )));
            }
        }

        let writing_task = match raw.chapter.writing_task {
            Some(ref id) if raw.chapter.tasks.iter().any(|t| &t.id == id) => id.clone(),
            Some(ref id) => {
                return Err(QuilldagError::ConfigError(format!(
                    "[chapter].writing_task '{id}' is not a chapter task"
                )));
            }
            None => {
                return Err(QuilldagError::ConfigError(
                    "[chapter].writing_task must name the task whose output is the chapter"
                        .to_string(),
                ));
            }
        };

        Ok(ConfigFile::new_unchecked(
            run,
            raw.role,
            raw.outline,
            raw.chapter,
            writing_task,
        ))
    }
}

fn validate_run(run: &RunSection) -> Result<RunSettings> {
    if run.chapters == 0 {
        return Err(QuilldagError::ConfigError(
            "[run].chapters must be >= 1 (got 0)".to_string(),
        ));
    }

    if run.max_attempts == 0 {
        return Err(QuilldagError::ConfigError(
            "[run].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    if run.min_words > run.max_words {
        return Err(QuilldagError::ConfigError(format!(
            "[run].min_words ({}) must not exceed [run].max_words ({})",
            run.min_words, run.max_words
        )));
    }

    let timeout = parse_duration(&run.timeout)
        .map_err(|e| QuilldagError::ConfigError(format!("invalid [run].timeout: {e}")))?;
    if timeout.is_zero() {
        return Err(QuilldagError::ConfigError(
            "[run].timeout must be greater than zero".to_string(),
        ));
    }

    let retry_delay = parse_duration(&run.retry_delay)
        .map_err(|e| QuilldagError::ConfigError(format!("invalid [run].retry_delay: {e}")))?;

    Ok(RunSettings {
        title: run.title.clone(),
        premise: run.premise.clone(),
        chapters: run.chapters,
        min_words: run.min_words,
        max_words: run.max_words,
        max_attempts: run.max_attempts,
        timeout,
        retry_delay,
        mode: run.mode,
        output_dir: run.output_dir.clone(),
    })
}

fn ensure_has_tasks(stage: &str, tasks: &[TaskTemplate]) -> Result<()> {
    if tasks.is_empty() {
        return Err(QuilldagError::ConfigError(format!(
            "config must contain at least one [[{stage}.task]] entry"
        )));
    }
    Ok(())
}

fn validate_roles(roles: &BTreeMap<RoleId, RoleConfig>) -> Result<()> {
    for (name, role) in roles.iter() {
        if role.cmd.trim().is_empty() {
            return Err(QuilldagError::ConfigError(format!(
                "[role.{name}].cmd must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_task_roles(
    stage: &str,
    tasks: &[TaskTemplate],
    roles: &BTreeMap<RoleId, RoleConfig>,
) -> Result<()> {
    for task in tasks.iter() {
        if !roles.contains_key(&task.role) {
            return Err(QuilldagError::ConfigError(format!(
                "{stage} task '{}' uses unknown role '{}' (no [role.{}] section)",
                task.id, task.role, task.role
            )));
        }
    }
    Ok(())
}

/// Build the stage once with empty template values; the graph's own
/// construction checks ids, dependencies and cycles.
fn validate_dag(stage: &str, tasks: &[TaskTemplate]) -> Result<()> {
    StageDefinition::new(tasks.to_vec())
        .build(&TemplateVars::default())
        .map(|_| ())
        .map_err(|source| QuilldagError::Build {
            stage: stage.to_string(),
            source,
        })
}
