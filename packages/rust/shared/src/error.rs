//! Error types for topicrawl.
//!
//! Library crates use [`TopicrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::{ErrorSlug, TaskStatus};

/// Top-level error type for all topicrawl operations.
#[derive(Debug, thiserror::Error)]
pub enum TopicrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The search gateway failed to produce seed URLs.
    #[error("search system error: {0}")]
    SearchSystem(String),

    /// The search gateway answered, but with zero seed URLs.
    #[error("no seed sources found for query {query:?}")]
    NoSeedSources { query: String },

    /// A launch was requested for a task that cannot be launched.
    #[error("task {task_id} is in status {status}, expected created or active")]
    InvalidTaskState { task_id: i64, status: TaskStatus },

    /// A task status change that the task lifecycle does not allow.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// The launch ran past its deadline.
    #[error("launch timed out after {timeout_ms}ms")]
    LaunchTimeout { timeout_ms: u64 },

    /// The launch was cancelled by its caller.
    #[error("launch cancelled")]
    Cancelled,

    /// Reconciliation produced inconsistent persistence results.
    #[error("integrity error: {message}")]
    Integrity { message: String },

    /// Network/HTTP error outside of per-page fetching.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A requested entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad query, bad task parameters, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TopicrawlError>;

impl TopicrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an integrity error from any displayable message.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Slug recorded on a failed launch. Internal error text never leaves
    /// through this path.
    pub fn slug(&self) -> ErrorSlug {
        match self {
            Self::SearchSystem(_) => ErrorSlug::SearchSystemError,
            Self::NoSeedSources { .. } => ErrorSlug::NoSeedSources,
            Self::LaunchTimeout { .. } => ErrorSlug::LaunchTimeout,
            Self::Integrity { .. } => ErrorSlug::IntegrityError,
            _ => ErrorSlug::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TopicrawlError::config("missing database path");
        assert_eq!(err.to_string(), "config error: missing database path");

        let err = TopicrawlError::InvalidTaskState {
            task_id: 7,
            status: TaskStatus::Stopped,
        };
        assert_eq!(
            err.to_string(),
            "task 7 is in status stopped, expected created or active"
        );

        let err = TopicrawlError::LaunchTimeout { timeout_ms: 300 };
        assert_eq!(err.to_string(), "launch timed out after 300ms");
    }

    #[test]
    fn slug_mapping() {
        assert_eq!(
            TopicrawlError::SearchSystem("502".into()).slug(),
            ErrorSlug::SearchSystemError
        );
        assert_eq!(
            TopicrawlError::NoSeedSources { query: "q".into() }.slug(),
            ErrorSlug::NoSeedSources
        );
        assert_eq!(
            TopicrawlError::integrity("overlap").slug(),
            ErrorSlug::IntegrityError
        );
        assert_eq!(
            TopicrawlError::Storage("disk full".into()).slug(),
            ErrorSlug::Unknown
        );
    }
}
