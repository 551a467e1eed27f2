//! Error types for archdocs.
//!
//! Library crates use [`ArchDocsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all archdocs operations.
#[derive(Debug, thiserror::Error)]
pub enum ArchDocsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to an analysis endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// Response body or analysis payload could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The analysis service reported the job as failed.
    #[error("{endpoint} job failed: {message}")]
    JobFailed { endpoint: String, message: String },

    /// The job did not reach a terminal state before its deadline.
    #[error("timeout waiting for {endpoint} after {:.1}s", .elapsed.as_secs_f64())]
    Timeout { endpoint: String, elapsed: Duration },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad endpoint set, malformed input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An external program (generator, site builder) failed.
    #[error("{program} failed: {message}")]
    Command { program: String, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArchDocsError>;

impl ArchDocsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
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

    /// Whether this error is a deadline expiry rather than a service or transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
