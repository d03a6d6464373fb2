//! Bookkeeping for tasks that process many inputs and skip the bad ones.

use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::warn;

/// An input left out of the result, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// Accepted items plus the inputs that were skipped.
#[derive(Debug)]
pub struct BestEffort<T> {
    pub accepted: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for BestEffort<T> {
    fn default() -> Self {
        BestEffort {
            accepted: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BestEffort<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, item: T) {
        self.accepted.push(item);
    }

    /// Record a skipped input and log it.
    pub fn skip(&mut self, path: &Path, reason: impl Display) {
        let reason = reason.to_string();
        warn!(path = %path.display(), %reason, "Skipping input");
        self.skipped.push(Skipped {
            path: path.to_path_buf(),
            reason,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}
