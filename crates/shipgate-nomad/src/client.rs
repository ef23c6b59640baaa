//! HTTP client for the Nomad API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::job::JobDocument;
use crate::outcome::{RawOutcome, SubmitReceipt};
use crate::Orchestrator;

const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Longest slice of an error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`NomadClient`].
#[derive(Debug, Clone)]
pub struct NomadClientConfig {
    pub url: String,
    pub token: Option<String>,
    pub skip_tls_verify: bool,
    /// Applied to job fetch, submit and parse.
    pub submit_timeout: Duration,
    /// Applied to evaluation lookups.
    pub status_timeout: Duration,
}

impl NomadClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            skip_tls_verify: false,
            submit_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }
}

/// Nomad API client. Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
    submit_timeout: Duration,
    status_timeout: Duration,
}

impl NomadClient {
    pub fn new(config: &NomadClientConfig) -> OrchestratorResult<Self> {
        let base_url = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| OrchestratorError::Config(format!("invalid nomad url {:?}: {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(OrchestratorError::Config(format!(
                "nomad url cannot be used as a base: {}",
                config.url
            )));
        }

        if config.skip_tls_verify {
            warn!(url = %base_url, "TLS certificate verification disabled for Nomad");
        }

        let http = Client::builder()
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .build()
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
            submit_timeout: config.submit_timeout,
            status_timeout: config.status_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/v1/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> OrchestratorResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OrchestratorError::Config(format!("bad base url {}", self.base_url)))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> OrchestratorResult<Response> {
        let response = self.authorize(request).timeout(timeout).send().await?;
        Ok(response)
    }
}

#[async_trait]
impl Orchestrator for NomadClient {
    async fn fetch_job_definition(&self, service_name: &str) -> OrchestratorResult<JobDocument> {
        let url = self.endpoint(&["job", service_name])?;
        debug!(service = %service_name, %url, "fetching job definition");

        let response = self.send(self.http.get(url), self.submit_timeout).await?;
        match response.status() {
            StatusCode::OK => {
                let body: Value = response.json().await?;
                JobDocument::from_response(body)
            }
            StatusCode::NOT_FOUND => Err(OrchestratorError::JobNotFound(service_name.to_string())),
            status => Err(rejected(status, response).await),
        }
    }

    async fn submit_job(&self, job: &JobDocument) -> OrchestratorResult<SubmitReceipt> {
        let url = self.endpoint(&["jobs"])?;
        let body = job.to_submission();
        debug!(job = job.id().unwrap_or("<unnamed>"), %url, "submitting job");

        let response = self
            .send(self.http.post(url).json(&body), self.submit_timeout)
            .await?;
        if !response.status().is_success() {
            return Err(rejected(response.status(), response).await);
        }

        let receipt: SubmitReceipt = response.json().await?;
        info!(
            job = job.id().unwrap_or("<unnamed>"),
            eval_id = %receipt.eval_id,
            "job submitted"
        );
        Ok(receipt)
    }

    async fn fetch_evaluation_outcome(&self, handle: &str) -> OrchestratorResult<RawOutcome> {
        let url = self.endpoint(&["evaluation", handle])?;
        debug!(eval_id = %handle, "fetching evaluation");

        let response = self.send(self.http.get(url), self.status_timeout).await?;
        if !response.status().is_success() {
            return Err(rejected(response.status(), response).await);
        }
        let outcome: RawOutcome = response.json().await?;
        debug!(eval_id = %handle, nomad_status = %outcome.status, "evaluation fetched");
        Ok(outcome)
    }

    async fn parse_raw_job_document(&self, raw: &str) -> OrchestratorResult<JobDocument> {
        let mut url = self.endpoint(&["jobs", "parse"])?;
        url.set_query(Some("namespace=*"));
        let body = json!({
            "JobHCL": raw,
            "Variables": "",
            "Canonicalize": true,
        });
        debug!(bytes = raw.len(), "parsing job document");

        let response = self
            .send(self.http.post(url).json(&body), self.submit_timeout)
            .await?;
        let status = response.status();
        // Only a refused document is the caller's fault. Auth and routing
        // failures on this endpoint are the gateway's.
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY) {
            let message = read_error_body(response).await;
            return Err(OrchestratorError::Parse {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            return Err(rejected(status, response).await);
        }

        let canonical: Value = response.json().await?;
        JobDocument::from_response(canonical)
    }
}

async fn rejected(status: StatusCode, response: Response) -> OrchestratorError {
    let body = read_error_body(response).await;
    warn!(status = status.as_u16(), %body, "nomad returned non-success status");
    OrchestratorError::Rejected {
        status: status.as_u16(),
        body,
    }
}

async fn read_error_body(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return status.to_string();
    }
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, token: Option<&str>) -> NomadClient {
        let config = NomadClientConfig::new(server.url()).with_token(token.map(str::to_string));
        NomadClient::new(&config).unwrap()
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(NomadClient::new(&NomadClientConfig::new("not a url")).is_err());
        assert!(NomadClient::new(&NomadClientConfig::new("mailto:ops@example.com")).is_err());
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = NomadClient::new(&NomadClientConfig::new("http://nomad:4646/")).unwrap();
        let url = client.endpoint(&["job", "web api"]).unwrap();
        assert_eq!(url.as_str(), "http://nomad:4646/v1/job/web%20api");
    }

    #[test]
    fn empty_token_is_dropped() {
        let config = NomadClientConfig::new("http://nomad:4646").with_token(Some(String::new()));
        assert!(config.token.is_none());
        assert!(!config.skip_tls_verify);
    }

    #[tokio::test]
    async fn fetch_job_sends_token_and_unwraps_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/job/web")
            .match_header("X-Nomad-Token", "tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Job": {"ID": "web", "Meta": {"owner": "ops"}}}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("tok"));
        let job = client.fetch_job_definition("web").await.unwrap();

        assert_eq!(job.id(), Some("web"));
        assert_eq!(job.meta().unwrap()["owner"], "ops");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_job_omits_token_header_when_unset() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/job/web")
            .match_header("X-Nomad-Token", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"ID": "web"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        client.fetch_job_definition("web").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_missing_job_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/job/ghost")
            .with_status(404)
            .with_body("job not found")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.fetch_job_definition("ghost").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::JobNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn fetch_server_error_is_rejected_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/job/web")
            .with_status(500)
            .with_body("rpc error: no leader")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.fetch_job_definition("web").await.unwrap_err();
        match err {
            OrchestratorError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("no leader"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/job/web")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.fetch_job_definition("web").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn submit_posts_envelope_and_returns_eval_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/jobs")
            .match_header("X-Nomad-Token", "tok")
            .match_body(Matcher::Json(json!({"Job": {"ID": "web", "Meta": {"tag": "v1"}}})))
            .with_status(200)
            .with_body(r#"{"EvalID": "e1", "JobID": "web", "JobModifyIndex": 7}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("tok"));
        let job = JobDocument::from_response(json!({"ID": "web", "Meta": {"tag": "v1"}})).unwrap();
        let receipt = client.submit_job(&job).await.unwrap();

        assert_eq!(receipt.handle(), Some("e1"));
        assert_eq!(receipt.job_id.as_deref(), Some("web"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_rejection_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/jobs")
            .with_status(403)
            .with_body("Permission denied")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let job = JobDocument::from_response(json!({"ID": "web"})).unwrap();
        let err = client.submit_job(&job).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Rejected { status: 403, .. }));
        assert!(err.to_string().contains("Permission denied"));
    }

    #[tokio::test]
    async fn evaluation_status_is_read() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/evaluation/e1")
            .with_status(200)
            .with_body(r#"{"ID": "e1", "Status": "complete"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let outcome = client.fetch_evaluation_outcome("e1").await.unwrap();
        assert_eq!(outcome.status, "complete");
    }

    #[tokio::test]
    async fn parse_sends_canonicalize_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/jobs/parse")
            .match_query(Matcher::UrlEncoded("namespace".into(), "*".into()))
            .match_body(Matcher::Json(json!({
                "JobHCL": "job \"web\" {}",
                "Variables": "",
                "Canonicalize": true
            })))
            .with_status(200)
            .with_body(r#"{"ID": "web", "Type": "service"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let job = client.parse_raw_job_document("job \"web\" {}").await.unwrap();
        assert_eq!(job.id(), Some("web"));
        assert_eq!(job.to_submission()["Job"]["Type"], "service");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn parse_client_error_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/jobs/parse")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("input.hcl:1,5-6: Missing block body")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.parse_raw_job_document("job {").await.unwrap_err();
        match err {
            OrchestratorError::Parse { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("Missing block body"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn parse_forbidden_is_rejected_not_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/jobs/parse")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("Permission denied")
            .create_async()
            .await;

        let client = client_for(&server, Some("expired"));
        let err = client.parse_raw_job_document("job \"web\" {}").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Rejected { status: 403, .. }));
    }

    #[tokio::test]
    async fn parse_unprocessable_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/jobs/parse")
            .match_query(Matcher::Any)
            .with_status(422)
            .with_body("invalid job")
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.parse_raw_job_document("job {}").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Parse { status: 422, .. }));
    }

    #[tokio::test]
    async fn parse_server_error_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/jobs/parse")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client.parse_raw_job_document("job \"web\" {}").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Rejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn unreachable_nomad_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let client = NomadClient::new(&NomadClientConfig::new("http://127.0.0.1:9")).unwrap();
        let err = client.fetch_evaluation_outcome("e1").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Unavailable(_)));
    }
}
