//! Domain errors for the fixloop repair system.

use thiserror::Error;
use uuid::Uuid;

use super::ports::VcsError;

/// Domain-level errors that can occur in the repair system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Job already exists: {0}")]
    JobAlreadyExists(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Version control error: {0}")]
    VersionControl(#[from] VcsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl DomainError {
    /// Whether this error is the push/clone authorisation failure.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::VersionControl(VcsError::PermissionDenied(_)))
    }
}
