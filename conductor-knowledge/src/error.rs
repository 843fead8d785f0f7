//! Errors raised by the audit log and knowledge-note lifecycle.

use conductor_protocol::ErrorKind;
use thiserror::Error;

/// Errors from [`crate::note`]'s state machine and [`crate::store`]'s audit log.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The referenced note does not exist.
    #[error("knowledge note not found: {0}")]
    NotFound(String),

    /// The requested status transition is not in the note lifecycle's table.
    #[error("invalid note transition: {from} -> {to}")]
    InvalidTransition {
        /// The note's current status.
        from: String,
        /// The status that was requested.
        to: String,
    },

    /// An edit was attempted against a note whose content is frozen (approved or archived).
    #[error("note {0} is approved and immutable; fork a new version to edit")]
    Immutable(String),
}

impl KnowledgeError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KnowledgeError::NotFound(_) => ErrorKind::InvalidRequest,
            KnowledgeError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            KnowledgeError::Immutable(_) => ErrorKind::InvalidContext,
        }
    }
}
