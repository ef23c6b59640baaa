//! Error types for the record store.

use thiserror::Error;

use crate::types::DeploymentStatus;

/// Result type alias for record store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("deployment already exists: {0}")]
    AlreadyExists(String),

    #[error("deployment not found: {0}")]
    NotFound(String),

    #[error("invalid status transition for {tag}: {from} -> {to}")]
    InvalidTransition {
        tag: String,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    #[error("remote handle already set for {tag}: {existing}")]
    HandleAlreadySet { tag: String, existing: String },
}
