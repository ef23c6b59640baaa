//! In-process orchestrator fake for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use shipgate_nomad::{
    JobDocument, Orchestrator, OrchestratorError, OrchestratorResult, RawOutcome, SubmitReceipt,
};

#[derive(Default)]
pub struct FakeOrchestrator {
    jobs: Mutex<HashMap<String, Value>>,
    evaluations: Mutex<HashMap<String, String>>,
    eval_id: Mutex<String>,
    submit_failure: Mutex<Option<u16>>,
    fetch_delay: Mutex<Option<Duration>>,
    pub submitted: Mutex<Vec<JobDocument>>,
    pub fetch_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub eval_calls: AtomicUsize,
    pub parse_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.eval_id.lock().unwrap() = "e1".to_string();
        fake
    }

    pub fn with_job(self, name: &str, job: Value) -> Self {
        self.jobs.lock().unwrap().insert(name.to_string(), job);
        self
    }

    pub fn with_eval_id(self, id: &str) -> Self {
        *self.eval_id.lock().unwrap() = id.to_string();
        self
    }

    pub fn with_submit_failure(self, status: u16) -> Self {
        *self.submit_failure.lock().unwrap() = Some(status);
        self
    }

    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Set the status reported for an evaluation. Unknown evaluations
    /// answer as if Nomad were unreachable.
    pub fn set_evaluation(&self, id: &str, status: &str) {
        self.evaluations
            .lock()
            .unwrap()
            .insert(id.to_string(), status.to_string());
    }

    pub fn calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
            + self.submit_calls.load(Ordering::SeqCst)
            + self.eval_calls.load(Ordering::SeqCst)
            + self.parse_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn fetch_job_definition(&self, service_name: &str) -> OrchestratorResult<JobDocument> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let job = self.jobs.lock().unwrap().get(service_name).cloned();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match job {
            Some(job) => JobDocument::from_response(job),
            None => Err(OrchestratorError::JobNotFound(service_name.to_string())),
        }
    }

    async fn submit_job(&self, job: &JobDocument) -> OrchestratorResult<SubmitReceipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.submit_failure.lock().unwrap() {
            return Err(OrchestratorError::Rejected {
                status,
                body: "job registration refused".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(job.clone());
        let eval_id = self.eval_id.lock().unwrap().clone();
        Ok(serde_json::from_value(json!({"EvalID": eval_id, "JobID": job.id()}))
            .expect("receipt json"))
    }

    async fn fetch_evaluation_outcome(&self, handle: &str) -> OrchestratorResult<RawOutcome> {
        self.eval_calls.fetch_add(1, Ordering::SeqCst);
        match self.evaluations.lock().unwrap().get(handle) {
            Some(status) => Ok(RawOutcome::new(status.clone())),
            None => Err(OrchestratorError::Unavailable("connection refused".to_string())),
        }
    }

    async fn parse_raw_job_document(&self, raw: &str) -> OrchestratorResult<JobDocument> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if raw.starts_with("job") {
            JobDocument::from_response(json!({"ID": "parsed", "Type": "service"}))
        } else {
            Err(OrchestratorError::Parse {
                status: 400,
                message: "input.hcl:1,1-1: Argument or block definition required".to_string(),
            })
        }
    }
}
