//! shipgate-nomad — typed access to the Nomad HTTP API.
//!
//! The gateway only needs four orchestrator operations, captured by the
//! [`Orchestrator`] trait so the deployment engine can run against an
//! in-process fake in tests:
//!
//! | Operation | Nomad endpoint | Timeout |
//! |---|---|---|
//! | `fetch_job_definition` | `GET /v1/job/{name}` | 30s |
//! | `submit_job` | `POST /v1/jobs` | 30s |
//! | `parse_raw_job_document` | `POST /v1/jobs/parse?namespace=*` | 30s |
//! | `fetch_evaluation_outcome` | `GET /v1/evaluation/{id}` | 10s |
//!
//! Two pure helpers live alongside the client: [`merge_deployment_metadata`]
//! (stamps a job's `Meta` with the deployment tag) and
//! [`map_outcome_to_status`] (evaluation status → local record status).

pub mod client;
pub mod error;
pub mod job;
pub mod outcome;

use async_trait::async_trait;

pub use client::{NomadClient, NomadClientConfig};
pub use error::{OrchestratorError, OrchestratorResult};
pub use job::{DeploymentMetadata, JobDocument, merge_deployment_metadata};
pub use outcome::{RawOutcome, SubmitReceipt, map_outcome_to_status};

/// Operations the deployment engine needs from the orchestrator.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Current definition of an existing job.
    async fn fetch_job_definition(&self, service_name: &str) -> OrchestratorResult<JobDocument>;

    /// Register a job; returns the evaluation handle.
    async fn submit_job(&self, job: &JobDocument) -> OrchestratorResult<SubmitReceipt>;

    async fn fetch_evaluation_outcome(&self, handle: &str) -> OrchestratorResult<RawOutcome>;

    /// Canonicalize a caller-supplied job document via Nomad's own parser.
    async fn parse_raw_job_document(&self, raw: &str) -> OrchestratorResult<JobDocument>;
}
