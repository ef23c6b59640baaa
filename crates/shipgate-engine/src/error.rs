//! Error types for the deployment engine.

use shipgate_nomad::OrchestratorError;
use shipgate_state::StateError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Classification of an [`EngineError`] for callers that map failures to
/// transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    OrchestratorUnavailable,
    OrchestratorRejected,
    ParseError,
    StoreError,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tag has already been used by an earlier submission.
    #[error("deployment tag already exists: {0}")]
    Conflict(String),

    #[error("deployment not found: {0}")]
    NotFound(String),

    /// An orchestrator call failed after the record for `tag` was created.
    /// The record has been marked failed.
    #[error("deployment {tag} failed: {source}")]
    Orchestrator {
        tag: String,
        #[source]
        source: OrchestratorError,
    },

    #[error("record store error: {0}")]
    Store(#[from] StateError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Orchestrator { source, .. } => match source {
                OrchestratorError::Unavailable(_) | OrchestratorError::Config(_) => {
                    ErrorKind::OrchestratorUnavailable
                }
                OrchestratorError::Rejected { .. } | OrchestratorError::InvalidResponse(_) => {
                    ErrorKind::OrchestratorRejected
                }
                OrchestratorError::JobNotFound(_) => ErrorKind::NotFound,
                OrchestratorError::Parse { .. } => ErrorKind::ParseError,
            },
            EngineError::Store(_) => ErrorKind::StoreError,
        }
    }

    /// Whether a record exists for this failure and now reads `failed`.
    pub fn marked_failed(&self) -> bool {
        matches!(self, EngineError::Orchestrator { .. })
    }
}
