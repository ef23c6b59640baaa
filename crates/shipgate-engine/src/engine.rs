//! DeploymentEngine — sequences record store and orchestrator calls.
//!
//! A submission always creates its record first, so the tag is claimed
//! before anything reaches Nomad. Every later failure leaves the record
//! readable as `failed`.

use std::collections::HashMap;
use std::sync::Arc;

use shipgate_nomad::{
    DeploymentMetadata, JobDocument, Orchestrator, OrchestratorError, map_outcome_to_status,
    merge_deployment_metadata,
};
use shipgate_state::{DeploymentRecord, DeploymentStatus, RecordStore, StateError, unix_now};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};

/// What callers learn about a deployment after submit or query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub tag: String,
    pub status: DeploymentStatus,
    pub handle: Option<String>,
}

impl DeploymentReport {
    fn running(tag: &str, handle: Option<&str>) -> Self {
        Self {
            tag: tag.to_string(),
            status: DeploymentStatus::Running,
            handle: handle.map(str::to_string),
        }
    }

    fn from_record(record: DeploymentRecord) -> Self {
        Self {
            tag: record.tag,
            status: record.status,
            handle: record.remote_handle,
        }
    }
}

pub struct DeploymentEngine {
    store: RecordStore,
    orchestrator: Arc<dyn Orchestrator>,
    identity: String,
    /// One lock per service name, held across fetch → merge → submit.
    service_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeploymentEngine {
    /// `identity` is stamped into each job's `updated_by` meta key.
    pub fn new(
        store: RecordStore,
        orchestrator: Arc<dyn Orchestrator>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            identity: identity.into(),
            service_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Redeploy the existing Nomad job `service_name`, stamped with `tag`.
    pub async fn submit_by_name(
        &self,
        tag: &str,
        service_name: &str,
    ) -> EngineResult<DeploymentReport> {
        require("tag", tag)?;
        require("service_name", service_name)?;
        self.claim(tag, Some(service_name))?;
        info!(%tag, service = %service_name, "deployment requested");

        let lock = self.service_lock(service_name).await;
        let result = {
            let _guard = lock.lock().await;
            self.redeploy(tag, service_name).await
        };
        self.release_service_lock(service_name, lock).await;
        result
    }

    /// Fetch, stamp and resubmit. Callers hold the service lock.
    async fn redeploy(&self, tag: &str, service_name: &str) -> EngineResult<DeploymentReport> {
        let job = match self.orchestrator.fetch_job_definition(service_name).await {
            Ok(job) => job,
            Err(e) => return Err(self.fail(tag, e)),
        };
        let metadata = DeploymentMetadata::new(tag, unix_now(), &self.identity);
        let stamped = merge_deployment_metadata(&job, &metadata);
        self.submit(tag, &stamped).await
    }

    /// Deploy a caller-supplied job document after Nomad canonicalizes it.
    pub async fn submit_by_document(
        &self,
        tag: &str,
        raw_document: &str,
    ) -> EngineResult<DeploymentReport> {
        require("tag", tag)?;
        require("job document", raw_document)?;
        self.claim(tag, None)?;
        info!(%tag, bytes = raw_document.len(), "job document deployment requested");

        let job = match self.orchestrator.parse_raw_job_document(raw_document).await {
            Ok(job) => job,
            Err(e) => return Err(self.fail(tag, e)),
        };
        self.submit(tag, &job).await
    }

    /// Current status of `tag`, refreshed from Nomad while it is running.
    pub async fn query_status(&self, tag: &str) -> EngineResult<DeploymentReport> {
        require("tag", tag)?;
        let record = match self.store.get(tag) {
            Ok(record) => record,
            Err(StateError::NotFound(_)) => return Err(EngineError::NotFound(tag.to_string())),
            Err(e) => return Err(e.into()),
        };

        // Terminal, pending, or submitted without an evaluation: nothing to refresh.
        let handle = match (record.status, record.remote_handle.clone()) {
            (DeploymentStatus::Running, Some(handle)) => handle,
            _ => return Ok(DeploymentReport::from_record(record)),
        };

        let outcome = match self.orchestrator.fetch_evaluation_outcome(&handle).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%tag, eval_id = %handle, error = %e, "status refresh failed, returning stored status");
                return Ok(DeploymentReport::from_record(record));
            }
        };

        let mapped = map_outcome_to_status(&outcome);
        debug!(%tag, eval_id = %handle, nomad_status = %outcome.status, status = %mapped, "evaluation checked");
        if mapped != record.status {
            match self.store.set_status(tag, mapped) {
                Ok(_) => info!(%tag, from = %record.status, to = %mapped, "deployment status updated"),
                Err(e) => error!(%tag, status = %mapped, error = %e, "failed to persist refreshed status"),
            }
        }

        Ok(DeploymentReport {
            tag: record.tag,
            status: mapped,
            handle: Some(handle),
        })
    }

    fn claim(&self, tag: &str, service_name: Option<&str>) -> EngineResult<()> {
        match self.store.create(tag, service_name) {
            Ok(_) => Ok(()),
            Err(StateError::AlreadyExists(_)) => {
                warn!(%tag, "duplicate deployment tag rejected");
                Err(EngineError::Conflict(tag.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn submit(&self, tag: &str, job: &JobDocument) -> EngineResult<DeploymentReport> {
        let receipt = match self.orchestrator.submit_job(job).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.fail(tag, e)),
        };

        let handle = receipt.handle();
        let stored = match handle {
            Some(handle) => self
                .store
                .set_handle_and_status(tag, handle, DeploymentStatus::Running),
            None => {
                warn!(%tag, "nomad created no evaluation, status will not be tracked");
                self.store.set_status(tag, DeploymentStatus::Running)
            }
        };
        if let Err(e) = stored {
            error!(%tag, eval_id = ?handle, error = %e, "job submitted but record update failed");
        }

        info!(%tag, eval_id = ?handle, "deployment running");
        Ok(DeploymentReport::running(tag, handle))
    }

    /// Mark `tag` failed and wrap the orchestrator error for the caller.
    fn fail(&self, tag: &str, source: OrchestratorError) -> EngineError {
        warn!(%tag, error = %source, "deployment failed");
        if let Err(e) = self.store.set_status(tag, DeploymentStatus::Failed) {
            error!(%tag, error = %e, "failed to mark deployment failed");
        }
        EngineError::Orchestrator {
            tag: tag.to_string(),
            source,
        }
    }

    async fn service_lock(&self, service_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.service_locks.lock().await;
        Arc::clone(locks.entry(service_name.to_string()).or_default())
    }

    /// Drop our handle and forget the entry once no other submission holds
    /// or waits on it. Handles are only cloned under the map lock, so a
    /// count of one here means the map owns the last reference.
    async fn release_service_lock(&self, service_name: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.service_locks.lock().await;
        drop(lock);
        if locks
            .get(service_name)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(service_name);
        }
    }

    #[cfg(test)]
    async fn tracked_services(&self) -> usize {
        self.service_locks.lock().await.len()
    }
}

fn require(field: &str, value: &str) -> EngineResult<()> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
