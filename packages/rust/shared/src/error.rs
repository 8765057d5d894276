//! Error types for DealDesk.
//!
//! Library crates use [`DealDeskError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all DealDesk operations.
#[derive(Debug, thiserror::Error)]
pub enum DealDeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// AI classification error (request, HTTP status, or response parsing).
    ///
    /// Never escapes the classification adapter; it is converted into the
    /// fallback draft at that boundary.
    #[error("classification error: {0}")]
    Classification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing fields, unsupported file type, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// CSV import rejected as a whole (empty file, unmappable columns).
    #[error("import rejected: {message}")]
    Import { message: String },

    /// A deal or referent id that is not in the collection.
    #[error("not found: {0}")]
    NotFound(String),

    /// JSON or value parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DealDeskError>;

impl DealDeskError {
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

    /// Create an import rejection from any displayable message.
    pub fn import(msg: impl Into<String>) -> Self {
        Self::Import {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DealDeskError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DealDeskError::import("could not map the CSV columns");
        assert!(err.to_string().starts_with("import rejected:"));
        assert!(err.to_string().contains("CSV columns"));
    }

    #[test]
    fn not_found_carries_id() {
        let err = DealDeskError::NotFound("deal DEAL-20240115-abc123".into());
        assert!(err.to_string().contains("DEAL-20240115-abc123"));
    }
}
