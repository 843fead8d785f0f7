//! Errors specific to manifest loading. Execution-time errors use
//! [`conductor_protocol::ToolError`] directly so callers only ever match
//! on one tool-error type.

use thiserror::Error;

/// Errors from [`crate::manifest::parse`] and directory loading.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A required field was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A top-level key outside the closed set was present.
    #[error("unknown top-level key: {0}")]
    UnknownKey(String),

    /// A line could not be parsed.
    #[error("parse error at line {0}: {1}")]
    Parse(usize, String),

    /// The manifest directory could not be read.
    #[error("could not read manifest directory: {0}")]
    Io(#[from] std::io::Error),
}
