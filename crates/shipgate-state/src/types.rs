//! Domain types for the record store.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Caller-supplied correlation identifier for one deployment attempt.
pub type Tag = String;

/// Local view of deployment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Record created, orchestrator not yet (successfully) contacted.
    Pending,
    /// Job submitted; evaluation outcome not yet terminal.
    Running,
    Completed,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` are never revisited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Completed | DeploymentStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the record lifecycle:
    /// pending → running → {completed, failed}, or pending → failed.
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Running) | (Pending, Failed) => true,
            (Running, Completed) | (Running, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of tracked state: one record per tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub tag: Tag,
    /// Nomad job targeted by name. `None` for raw-document submissions.
    pub service_name: Option<String>,
    /// Evaluation ID returned by Nomad at submission time.
    pub remote_handle: Option<String>,
    pub status: DeploymentStatus,
    /// Unix timestamp (seconds) when the record was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last status or handle change.
    pub updated_at: u64,
}

impl DeploymentRecord {
    /// A fresh `pending` record.
    pub fn pending(tag: &str, service_name: Option<&str>, now: u64) -> Self {
        Self {
            tag: tag.to_string(),
            service_name: service_name
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            remote_handle: None,
            status: DeploymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn table_key(&self) -> &str {
        &self.tag
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
