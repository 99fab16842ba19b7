// src/pipeline/artifact.rs

//! Artifacts produced by a run and the sink they are persisted to.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::FileSystem;

pub const OUTLINE_KEY: &str = "outline.txt";
pub const MANIFEST_KEY: &str = "manifest.toml";

/// What an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Outline,
    Chapter(u32),
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Outline => f.write_str("outline"),
            ArtifactKind::Chapter(n) => write!(f, "chapter {n}"),
        }
    }
}

/// Immutable result of a validated stage: raw text, its formatted rendering
/// and the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    kind: ArtifactKind,
    raw: String,
    formatted: String,
    key: String,
}

impl Artifact {
    /// The compiled outline, stored as plain text.
    pub fn outline(raw: String) -> Self {
        Self {
            kind: ArtifactKind::Outline,
            formatted: raw.clone(),
            raw,
            key: OUTLINE_KEY.to_string(),
        }
    }

    /// A validated chapter, rendered as a minimal HTML document.
    pub fn chapter(number: u32, raw: String, title: &str) -> Self {
        Self {
            kind: ArtifactKind::Chapter(number),
            formatted: format_chapter_html(number, &raw, title),
            raw,
            key: chapter_key(number),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

pub fn chapter_key(number: u32) -> String {
    format!("chapter_{number}.html")
}

/// Wrap each blank-line separated paragraph in `<p>` and place the result
/// in an HTML page headed by the chapter number. Title and text are escaped.
pub fn format_chapter_html(number: u32, raw: &str, title: &str) -> String {
    let title = escape_html(title);
    let body = raw
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{title} - Chapter {number}</title>\n</head>\n<body>\n<h1>Chapter {number}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Destination for artifacts.
///
/// `persist` must be idempotent for identical key and content. `clear`
/// removes everything from previous runs and is safe to call repeatedly.
pub trait ArtifactSink: Send + Sync + fmt::Debug {
    fn persist(&self, key: &str, content: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores artifacts as files in one output directory.
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl FsArtifactSink {
    pub fn new(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl ArtifactSink for FsArtifactSink {
    fn persist(&self, key: &str, content: &str) -> Result<()> {
        let path = self.path_for(key);
        self.fs.write(&path, content.as_bytes())?;
        info!(key, path = %path.display(), bytes = content.len(), "artifact persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if !self.fs.is_dir(&self.dir) {
            self.fs.create_dir_all(&self.dir)?;
            return Ok(());
        }

        let entries = self.fs.read_dir(&self.dir)?;
        for entry in entries.iter() {
            self.fs.remove(entry)?;
            debug!(path = %entry.display(), "removed previous artifact");
        }
        info!(dir = %self.dir.display(), removed = entries.len(), "output directory cleared");
        Ok(())
    }
}
