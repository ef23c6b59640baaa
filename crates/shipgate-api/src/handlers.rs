//! REST API handlers.
//!
//! Each handler delegates to the `DeploymentEngine` and answers with a
//! [`DeploymentResponse`] body.

use axum::Json;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use shipgate_engine::{DeploymentReport, EngineError, ErrorKind};
use tracing::{debug, info};

use crate::{ApiState, MAX_JOB_DOCUMENT_BYTES};

/// Body of every deploy and status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResponse {
    /// Record status, or `error` when the request failed before a record
    /// was created.
    pub status: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<DeploymentReport> for DeploymentResponse {
    fn from(report: DeploymentReport) -> Self {
        Self {
            status: report.status.as_str().to_string(),
            tag: report.tag,
            handle: report.handle,
            message: None,
        }
    }
}

pub(crate) fn error_response(tag: &str, msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(DeploymentResponse {
            status: "error".to_string(),
            tag: tag.to_string(),
            handle: None,
            message: Some(msg.to_string()),
        }),
    )
}

fn engine_error(tag: &str, err: EngineError) -> Response {
    let status = if err.marked_failed() { "failed" } else { "error" };
    let body = DeploymentResponse {
        status: status.to_string(),
        tag: tag.to_string(),
        handle: None,
        message: Some(err.to_string()),
    };
    (status_code(err.kind()), Json(body)).into_response()
}

fn report_response(result: Result<DeploymentReport, EngineError>, tag: &str) -> Response {
    match result {
        Ok(report) => Json(DeploymentResponse::from(report)).into_response(),
        Err(e) => engine_error(tag, e),
    }
}

/// HTTP status for each engine error kind.
pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::ParseError => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::OrchestratorRejected => StatusCode::BAD_GATEWAY,
        ErrorKind::OrchestratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::StoreError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Health ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 timestamp.
    pub time: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        time: chrono::Utc::now().to_rfc3339(),
    })
}

// ── Deploy ─────────────────────────────────────────────────────

/// Deploy request body.
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    #[serde(default)]
    pub service_name: String,
    #[serde(default, alias = "tag_id")]
    pub tag: String,
}

/// POST /deploy
pub async fn deploy(
    State(state): State<ApiState>,
    body: Result<Json<DeployRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            let msg = format!("invalid request body: {}", e.body_text());
            return error_response("", &msg, StatusCode::BAD_REQUEST).into_response();
        }
    };

    // Same normalization as the multipart form fields.
    let tag = req.tag.trim();
    let service_name = req.service_name.trim();
    info!(%tag, service = %service_name, "deploy request received");
    let result = state.engine.submit_by_name(tag, service_name).await;
    report_response(result, tag)
}

/// POST /deploy/job
///
/// Multipart form with a `tag` (or `tag_id`) field and a `job_file` part
/// holding the job document.
pub async fn deploy_job(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            return error_response("", &e.body_text(), StatusCode::BAD_REQUEST).into_response();
        }
    };

    let mut tag = String::new();
    let mut document: Option<Vec<u8>> = None;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(&tag, &e.body_text(), e.status()).into_response();
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("tag") | Some("tag_id") => match field.text().await {
                Ok(text) => tag = text.trim().to_string(),
                Err(e) => return error_response(&tag, &e.body_text(), e.status()).into_response(),
            },
            Some("job_file") => {
                let mut buf = Vec::new();
                loop {
                    match field.chunk().await {
                        Ok(Some(chunk)) => {
                            if buf.len() + chunk.len() > MAX_JOB_DOCUMENT_BYTES {
                                return error_response(
                                    &tag,
                                    "job file exceeds 1 MiB limit",
                                    StatusCode::BAD_REQUEST,
                                )
                                .into_response();
                            }
                            buf.extend_from_slice(&chunk);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            return error_response(&tag, &e.body_text(), e.status()).into_response();
                        }
                    }
                }
                document = Some(buf);
            }
            other => debug!(field = ?other, "ignoring unknown form field"),
        }
    }

    let Some(document) = document else {
        return error_response(&tag, "job_file is required", StatusCode::BAD_REQUEST).into_response();
    };
    let document = match String::from_utf8(document) {
        Ok(text) => text,
        Err(_) => {
            return error_response(&tag, "job file is not valid UTF-8", StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    info!(%tag, bytes = document.len(), "job deploy request received");
    let result = state.engine.submit_by_document(&tag, &document).await;
    report_response(result, &tag)
}

// ── Status ─────────────────────────────────────────────────────

/// GET /status/{tag}
pub async fn status(State(state): State<ApiState>, Path(tag): Path<String>) -> Response {
    let result = state.engine.query_status(&tag).await;
    report_response(result, &tag)
}
