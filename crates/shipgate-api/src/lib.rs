//! shipgate-api — HTTP surface of the deployment gateway.
//!
//! # Routes
//!
//! | Method | Path | Auth | Description |
//! |---|---|---|---|
//! | GET | `/health` | no | Liveness probe |
//! | POST | `/deploy` | yes | Redeploy a named Nomad job under a new tag |
//! | POST | `/deploy/job` | yes | Deploy an uploaded job document (multipart) |
//! | GET | `/status/{tag}` | yes | Current status of a deployment |
//!
//! Authenticated routes require the `X-Secret-Key` header to match the
//! configured secret.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use shipgate_engine::DeploymentEngine;

/// Largest job document accepted by `POST /deploy/job`.
pub const MAX_JOB_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Request body cap. Leaves room for multipart framing and the other form
/// fields around a maximum-size job document.
const MAX_REQUEST_BYTES: usize = 2 * MAX_JOB_DOCUMENT_BYTES;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DeploymentEngine>,
    pub secret: Arc<str>,
}

impl ApiState {
    pub fn new(engine: Arc<DeploymentEngine>, secret: &str) -> Self {
        Self {
            engine,
            secret: Arc::from(secret),
        }
    }
}

/// Build the gateway router.
pub fn build_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/deploy", post(handlers::deploy))
        .route("/deploy/job", post(handlers::deploy_job))
        .route("/status/{tag}", get(handlers::status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_secret,
        ))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
}
