// src/pipeline/retry.rs

//! Attempt bookkeeping shared by the outline stage and chapter units.

use std::fmt;
use std::time::Duration;

/// Why one attempt at a stage did not produce an accepted result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The writing task's output was below the minimum word count.
    TooShort { words: usize, min_words: usize },
    /// A worker timed out or failed; the message is the scheduler's error.
    Transient(String),
    /// The outline stage never completed, so the chapter could not be built.
    OutlineUnavailable { attempts: u32, reason: String },
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::TooShort { words, min_words } => {
                write!(f, "{words} words, below minimum of {min_words}")
            }
            AttemptFailure::Transient(msg) => f.write_str(msg),
            AttemptFailure::OutlineUnavailable { attempts, reason } => {
                write!(f, "outline stage failed after {attempts} attempt(s): {reason}")
            }
        }
    }
}

/// Bounded retry with a fixed delay after transient failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Pause before re-running after a timeout or worker failure.
    pub transient_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, transient_delay: Duration) -> Self {
        Self {
            max_attempts,
            transient_delay,
        }
    }

    /// Delay to apply before the next attempt. Validation rejections retry
    /// immediately.
    pub fn delay_after(&self, failure: &AttemptFailure) -> Duration {
        match failure {
            AttemptFailure::Transient(_) => self.transient_delay,
            AttemptFailure::TooShort { .. } | AttemptFailure::OutlineUnavailable { .. } => {
                Duration::ZERO
            }
        }
    }

    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}
