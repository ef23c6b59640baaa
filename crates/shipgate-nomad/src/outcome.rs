//! Submission receipts and evaluation outcomes.

use serde::Deserialize;
use shipgate_state::DeploymentStatus;

/// Response body of `POST /v1/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitReceipt {
    /// Evaluation created by the registration. Nomad leaves this empty for
    /// periodic and parameterized jobs.
    #[serde(rename = "EvalID", default)]
    pub eval_id: String,
    #[serde(rename = "JobID", default)]
    pub job_id: Option<String>,
}

impl SubmitReceipt {
    /// The remote handle to track, if Nomad created an evaluation.
    pub fn handle(&self) -> Option<&str> {
        Some(self.eval_id.as_str()).filter(|id| !id.is_empty())
    }
}

/// Response body of `GET /v1/evaluation/{id}`, reduced to what is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawOutcome {
    #[serde(rename = "Status", default)]
    pub status: String,
}

impl RawOutcome {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Map a Nomad evaluation status to the local record status.
///
/// `complete` → completed, `failed` → failed, anything else (including
/// `pending`, `blocked`, `canceled` and values Nomad may add later) →
/// running, so pollers keep polling rather than give up.
pub fn map_outcome_to_status(outcome: &RawOutcome) -> DeploymentStatus {
    match outcome.status.as_str() {
        "complete" => DeploymentStatus::Completed,
        "failed" => DeploymentStatus::Failed,
        _ => DeploymentStatus::Running,
    }
}
