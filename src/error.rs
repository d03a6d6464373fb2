//! Error taxonomy shared by every task.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    /// The page range expression could not be parsed.
    #[error("Invalid page range '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// A page reference falls outside the document.
    #[error("Page {page} is out of range (1-{page_count})")]
    PageOutOfRange { page: i64, page_count: u32 },

    /// An input file does not exist.
    #[error("Input file not found: {0}")]
    SourceNotFound(PathBuf),

    /// A parameter is missing or has an unusable value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("PDF has no pages: {0}")]
    EmptyDocument(PathBuf),

    #[error("Invalid password - could not decrypt PDF")]
    InvalidPassword,

    /// The document is encrypted and a password is needed to read it.
    #[error("PDF is password protected: {0}")]
    PasswordRequired(PathBuf),

    /// An external program needed by a collaborator is not installed.
    #[error("{tool} not found. Install it or set its path in the configuration")]
    ToolNotFound { tool: String },

    /// An external program ran but failed.
    #[error("{tool} failed: {message}")]
    Collaborator { tool: String, message: String },

    /// The PDF or image library reported an error.
    #[error("{context}: {message}")]
    LibraryFailure { context: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`TaskError`] for callers that branch on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidExpression,
    PageOutOfRange,
    SourceNotFound,
    InvalidParameter,
    EmptyDocument,
    InvalidPassword,
    PasswordRequired,
    ToolNotFound,
    Collaborator,
    LibraryFailure,
    Cancelled,
    Io,
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::InvalidExpression { .. } => ErrorKind::InvalidExpression,
            TaskError::PageOutOfRange { .. } => ErrorKind::PageOutOfRange,
            TaskError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            TaskError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            TaskError::EmptyDocument(_) => ErrorKind::EmptyDocument,
            TaskError::InvalidPassword => ErrorKind::InvalidPassword,
            TaskError::PasswordRequired(_) => ErrorKind::PasswordRequired,
            TaskError::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            TaskError::Collaborator { .. } => ErrorKind::Collaborator,
            TaskError::LibraryFailure { .. } => ErrorKind::LibraryFailure,
            TaskError::Cancelled => ErrorKind::Cancelled,
            TaskError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid_expression(expression: &str, reason: impl Into<String>) -> Self {
        TaskError::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        TaskError::InvalidParameter(message.into())
    }

    pub(crate) fn library(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        TaskError::LibraryFailure {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

impl From<lopdf::Error> for TaskError {
    fn from(err: lopdf::Error) -> Self {
        TaskError::library("Malformed PDF structure", err)
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, TaskError>;
