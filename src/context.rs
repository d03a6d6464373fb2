//! Per-invocation execution context threaded into every task.

use crate::collab::Collaborators;
use crate::config::{Config, Defaults};
use crate::error::{Result, TaskError};
use crate::page_range::PageSelector;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Receives progress as a percentage in `[0, 100]`.
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// Cooperative cancellation flag, checked between pages or parts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct TaskContext {
    pub job_id: String,
    pub session_dir: PathBuf,
    config: Arc<Config>,
    collaborators: Arc<Collaborators>,
    progress: Option<Arc<ProgressFn>>,
    cancel: CancelToken,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("job_id", &self.job_id)
            .field("session_dir", &self.session_dir)
            .field("has_progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl TaskContext {
    /// Create a context with a fresh job id and the configured session directory.
    pub fn new(config: Arc<Config>) -> Self {
        TaskContext {
            job_id: Uuid::new_v4().to_string(),
            session_dir: config.session_dir(),
            collaborators: Arc::new(Collaborators::system(&config.tools)),
            config,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Replace the external programs, e.g. with fakes in tests.
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Arc::new(collaborators);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn defaults(&self) -> &Defaults {
        &self.config.defaults
    }

    pub fn selector(&self) -> PageSelector {
        self.config.defaults.page_selector()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Start tracking progress over `total` units of work.
    pub fn progress(&self, total: usize) -> Progress<'_> {
        Progress {
            ctx: self,
            done: 0,
            total,
            ceiling: 100.0,
            last: 0.0,
        }
    }

    /// The session directory, created on first use.
    pub fn ensure_session_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.session_dir)?;
        Ok(&self.session_dir)
    }

    fn emit(&self, value: f64) {
        if let Some(callback) = &self.progress {
            callback(value);
        }
    }
}

/// Monotonic progress over a fixed number of units.
///
/// Each [`advance`](Progress::advance) emits `done / total * ceiling`. Tasks
/// that still have to write their output after the loop lower the ceiling
/// and call [`finish`](Progress::finish) once the file is on disk, so a
/// failed write never reports completion.
pub struct Progress<'a> {
    ctx: &'a TaskContext,
    done: usize,
    total: usize,
    ceiling: f64,
    last: f64,
}

impl Progress<'_> {
    pub fn with_ceiling(mut self, ceiling: f64) -> Self {
        self.ceiling = ceiling.clamp(0.0, 100.0);
        self
    }

    /// Check for cancellation before starting the next unit.
    pub fn checkpoint(&self) -> Result<()> {
        self.ctx.check_cancelled()
    }

    /// Record one finished unit of work.
    pub fn advance(&mut self) {
        if self.total == 0 {
            return;
        }
        self.done = (self.done + 1).min(self.total);
        let value = self.done as f64 / self.total as f64 * self.ceiling;
        self.report(value);
    }

    pub fn finish(&mut self) {
        self.done = self.total;
        self.report(100.0);
    }

    fn report(&mut self, value: f64) {
        let value = value.clamp(0.0, 100.0);
        if value >= self.last {
            self.last = value;
            self.ctx.emit(value);
        }
    }
}
