//! Error types for orchestrator calls.

use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Transport failure or timeout; Nomad was not reached or did not answer.
    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),

    /// Nomad answered with a non-success status code.
    #[error("orchestrator rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Nomad's parser refused the caller-supplied job document.
    #[error("job document rejected by parser ({status}): {message}")]
    Parse { status: u16, message: String },

    #[error("invalid orchestrator response: {0}")]
    InvalidResponse(String),

    #[error("invalid orchestrator client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            OrchestratorError::InvalidResponse(e.to_string())
        } else if e.is_timeout() {
            OrchestratorError::Unavailable(format!("request timed out: {e}"))
        } else {
            OrchestratorError::Unavailable(e.to_string())
        }
    }
}
