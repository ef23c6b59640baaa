//! shipgate-engine — tag-idempotent deployments against Nomad.
//!
//! The [`DeploymentEngine`] composes a [`RecordStore`](shipgate_state::RecordStore)
//! and an [`Orchestrator`](shipgate_nomad::Orchestrator):
//!
//! - **`submit_by_name`**: claim the tag, fetch the named job, stamp its
//!   `Meta`, resubmit it.
//! - **`submit_by_document`**: claim the tag, have Nomad parse the caller's
//!   job document, submit the result.
//! - **`query_status`**: read the record and, while it is running, refresh
//!   it from the evaluation outcome.
//!
//! Failures are reported as [`EngineError`], classified by [`ErrorKind`].

pub mod engine;
pub mod error;

#[cfg(test)]
mod testing;

pub use engine::{DeploymentEngine, DeploymentReport};
pub use error::{EngineError, EngineResult, ErrorKind};
