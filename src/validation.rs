// src/validation.rs

//! Word-count gate applied to a chapter's writing-task output.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("static regex"));

/// Decision of the gate, carrying the measured word count either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept(usize),
    Reject(usize),
}

impl Verdict {
    pub fn is_accept(self) -> bool {
        matches!(self, Verdict::Accept(_))
    }

    pub fn word_count(self) -> usize {
        match self {
            Verdict::Accept(n) | Verdict::Reject(n) => n,
        }
    }
}

/// Number of maximal runs of word characters in `text`.
pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// Accept `text` unless it has fewer than `min_words` words.
///
/// `max_words` is advisory: exceeding it is logged, never rejected.
pub fn validate(text: &str, min_words: usize, max_words: usize) -> Verdict {
    let count = word_count(text);

    if count < min_words {
        debug!(count, min_words, "artifact below minimum word count");
        return Verdict::Reject(count);
    }

    if count > max_words {
        warn!(count, max_words, "artifact exceeds advisory maximum word count");
    }

    Verdict::Accept(count)
}
