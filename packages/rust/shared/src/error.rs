//! Error types for LinkScout.
//!
//! Library crates use [`LinkScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LinkScout operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkScoutError {
    /// Configuration loading or validation error. Fatal, raised before a run starts.
    #[error("config error: {message}")]
    Config { message: String },

    /// Page navigation failed. Transient failures are eligible for retry.
    #[error("navigation error: {message}")]
    Navigation { message: String, transient: bool },

    /// A collaborator call did not complete within its individual timeout.
    #[error("timeout: {operation} did not complete within {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// Profile card or listing extraction error.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The relevance scorer could not obtain a decision.
    #[error("scoring error: {0}")]
    Scoring(String),

    /// The justification generator could not produce text.
    #[error("justification error: {0}")]
    Justification(String),

    /// Transport-level error talking to the generative-text service.
    #[error("generation error: {0}")]
    Generation(String),

    /// Session store error (missing, unreadable, or invalid storage state).
    #[error("session error: {0}")]
    Session(String),

    /// Result export error.
    #[error("export error: {0}")]
    Export(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input shape, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LinkScoutError>;

/// Coarse classification of a [`LinkScoutError`], used by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Navigation,
    Timeout,
    Extraction,
    Scoring,
    Justification,
    Generation,
    Session,
    Export,
    Io,
    Validation,
}

impl LinkScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a non-transient navigation error (never retried).
    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::Navigation {
            message: msg.into(),
            transient: false,
        }
    }

    /// Create a transient navigation error (eligible for retry).
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Navigation {
            message: msg.into(),
            transient: true,
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after_ms: after.as_millis() as u64,
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Scoring(_) => ErrorKind::Scoring,
            Self::Justification(_) => ErrorKind::Justification,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Session(_) => ErrorKind::Session,
            Self::Export(_) => ErrorKind::Export,
            Self::Io { .. } => ErrorKind::Io,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Whether the failure may succeed if the same operation is attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Navigation { transient, .. } => *transient,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
