//! Semi-structured Nomad job documents and deployment metadata merging.
//!
//! The job shape is owned by Nomad. The gateway only ever reads or writes
//! the `Meta` subtree, so the rest of the document is carried as an
//! opaque, ordered JSON map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Meta key holding the deployment tag.
pub const META_TAG: &str = "tag";
/// Meta key holding the unix timestamp (seconds, as a string) of the stamp.
pub const META_TIMESTAMP: &str = "timestamp";
/// Meta key naming the gateway that stamped the job.
pub const META_UPDATED_BY: &str = "updated_by";

/// A Nomad job definition (the object that goes under `"Job"` on submit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDocument(Map<String, Value>);

impl JobDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build from a Nomad response body.
    ///
    /// Accepts either the bare job object or a `{"Job": {...}}` envelope.
    pub fn from_response(value: Value) -> OrchestratorResult<Self> {
        match value {
            Value::Object(mut obj) => match obj.remove("Job") {
                Some(Value::Object(job)) => Ok(Self(job)),
                Some(other) => Err(OrchestratorError::InvalidResponse(format!(
                    "\"Job\" field is not an object: {}",
                    json_type(&other)
                ))),
                None => Ok(Self(obj)),
            },
            other => Err(OrchestratorError::InvalidResponse(format!(
                "expected a job object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// The job's `ID`, if present.
    pub fn id(&self) -> Option<&str> {
        self.0.get("ID").and_then(Value::as_str)
    }

    /// The job's `Meta` map. `None` when absent, null or not an object.
    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.0.get("Meta").and_then(Value::as_object)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The `{"Job": ...}` body expected by `POST /v1/jobs`.
    pub fn to_submission(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("Job".to_string(), Value::Object(self.0.clone()));
        Value::Object(envelope)
    }
}

/// Values stamped into a job's `Meta` on every deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentMetadata {
    pub tag: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub updated_by: String,
}

impl DeploymentMetadata {
    pub fn new(tag: impl Into<String>, timestamp: u64, updated_by: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            timestamp,
            updated_by: updated_by.into(),
        }
    }
}

/// Return a copy of `job` whose `Meta` carries the deployment metadata.
///
/// Reserved keys (`tag`, `timestamp`, `updated_by`) are always overwritten.
/// Every other existing key is kept with its value untouched, including
/// non-string values set by other tooling. A missing or malformed `Meta`
/// is replaced by the reserved keys alone.
pub fn merge_deployment_metadata(job: &JobDocument, metadata: &DeploymentMetadata) -> JobDocument {
    let mut meta = job.meta().cloned().unwrap_or_default();
    meta.insert(META_TAG.to_string(), Value::String(metadata.tag.clone()));
    meta.insert(
        META_TIMESTAMP.to_string(),
        Value::String(metadata.timestamp.to_string()),
    );
    meta.insert(
        META_UPDATED_BY.to_string(),
        Value::String(metadata.updated_by.clone()),
    );

    let mut fields = job.0.clone();
    fields.insert("Meta".to_string(), Value::Object(meta));
    JobDocument(fields)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(value: Value) -> JobDocument {
        JobDocument::from_response(value).unwrap()
    }

    fn stamp(tag: &str) -> DeploymentMetadata {
        DeploymentMetadata::new(tag, 1_700_000_000, "shipgate")
    }

    #[test]
    fn merge_preserves_foreign_keys_and_overwrites_reserved() {
        let original = job(json!({"ID": "web", "Meta": {"owner": "x", "tag": "old"}}));
        let merged = merge_deployment_metadata(&original, &stamp("new"));

        let meta = merged.meta().unwrap();
        assert_eq!(meta["owner"], "x");
        assert_eq!(meta["tag"], "new");
        assert_eq!(meta["timestamp"], "1700000000");
        assert_eq!(meta["updated_by"], "shipgate");
        assert_eq!(meta.len(), 4);
    }

    #[test]
    fn merge_does_not_mutate_input() {
        let original = job(json!({"ID": "web", "Meta": {"tag": "old"}}));
        let _ = merge_deployment_metadata(&original, &stamp("new"));
        assert_eq!(original.meta().unwrap()["tag"], "old");
    }

    #[test]
    fn merge_is_idempotent_for_same_stamp() {
        let original = job(json!({"ID": "web", "Meta": {"owner": "ops"}}));
        let once = merge_deployment_metadata(&original, &stamp("v1"));
        let twice = merge_deployment_metadata(&once, &stamp("v1"));
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_keeps_non_string_meta_values() {
        let original = job(json!({"Meta": {"replicas": 3, "flags": ["a"]}}));
        let merged = merge_deployment_metadata(&original, &stamp("v1"));
        let meta = merged.meta().unwrap();
        assert_eq!(meta["replicas"], 3);
        assert_eq!(meta["flags"], json!(["a"]));
    }

    #[test]
    fn merge_creates_meta_when_missing_or_null() {
        for original in [job(json!({"ID": "web"})), job(json!({"ID": "web", "Meta": null}))] {
            let merged = merge_deployment_metadata(&original, &stamp("v1"));
            let meta = merged.meta().unwrap();
            assert_eq!(meta.len(), 3);
            assert_eq!(meta["tag"], "v1");
        }
    }

    #[test]
    fn merge_leaves_other_job_fields_alone() {
        let original = job(json!({
            "ID": "web",
            "TaskGroups": [{"Name": "g", "Count": 2}],
            "Meta": {}
        }));
        let merged = merge_deployment_metadata(&original, &stamp("v1"));
        assert_eq!(merged.fields()["TaskGroups"], original.fields()["TaskGroups"]);
        assert_eq!(merged.id(), Some("web"));
    }

    #[test]
    fn from_response_unwraps_envelope() {
        let doc = job(json!({"Job": {"ID": "web"}}));
        assert_eq!(doc.id(), Some("web"));
    }

    #[test]
    fn from_response_rejects_non_object() {
        assert!(JobDocument::from_response(json!([1, 2])).is_err());
        assert!(JobDocument::from_response(json!({"Job": "web"})).is_err());
    }

    #[test]
    fn submission_wraps_in_job_envelope() {
        let doc = job(json!({"ID": "web"}));
        assert_eq!(doc.to_submission(), json!({"Job": {"ID": "web"}}));
    }
}
