// src/pipeline/stage.rs

//! Stage definitions: task templates that become a [`TaskGraph`] once the
//! values they reference are known.

use serde::Deserialize;

use crate::dag::{RoleId, TaskGraph, TaskId, TaskSpec};
use crate::errors::BuildError;

/// One task of a stage, with a description template.
///
/// Placeholders (`{premise}`, `{title}`, `{outline}`, `{chapter}`,
/// `{chapters}`, `{min_words}`, `{max_words}`) are substituted when the
/// graph is built; unknown placeholders are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskTemplate {
    pub id: TaskId,
    pub role: RoleId,

    /// Dependency list: this task waits for all tasks listed here, and
    /// receives their outputs in this order.
    #[serde(default)]
    pub after: Vec<TaskId>,

    #[serde(default)]
    pub description: String,
}

/// Values available to description templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    pub title: &'a str,
    pub premise: &'a str,
    /// Compiled outline; absent while building the outline stage itself.
    pub outline: Option<&'a str>,
    pub chapter: Option<u32>,
    pub chapters: u32,
    pub min_words: usize,
    pub max_words: usize,
}

impl TemplateVars<'_> {
    /// Substitute known placeholders in a single pass, so substituted text is
    /// never itself expanded.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];
            let Some(close) = after_open.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let key = &after_open[..close];
            match self.lookup(key) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after_open[close + 1..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "title" => Some(self.title.to_string()),
            "premise" => Some(self.premise.to_string()),
            "outline" => Some(self.outline.unwrap_or_default().to_string()),
            "chapter" => Some(self.chapter.map(|n| n.to_string()).unwrap_or_default()),
            "chapters" => Some(self.chapters.to_string()),
            "min_words" => Some(self.min_words.to_string()),
            "max_words" => Some(self.max_words.to_string()),
            _ => None,
        }
    }
}

/// Ordered task templates for one stage (outline or chapter).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageDefinition {
    pub tasks: Vec<TaskTemplate>,
}

impl StageDefinition {
    pub fn new(tasks: Vec<TaskTemplate>) -> Self {
        Self { tasks }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Task specs with descriptions rendered from `vars`.
    pub fn specs(&self, vars: &TemplateVars<'_>) -> Vec<TaskSpec> {
        self.tasks
            .iter()
            .map(|t| TaskSpec {
                id: t.id.clone(),
                role: t.role.clone(),
                after: t.after.clone(),
                description: vars.render(&t.description),
            })
            .collect()
    }

    /// Render templates and build a fresh graph.
    pub fn build(&self, vars: &TemplateVars<'_>) -> Result<TaskGraph, BuildError> {
        TaskGraph::build(self.specs(vars))
    }
}
