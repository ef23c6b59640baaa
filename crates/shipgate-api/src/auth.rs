//! Shared-secret authentication middleware.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::ApiState;
use crate::handlers::error_response;

pub const SECRET_HEADER: &str = "x-secret-key";

/// Reject requests whose `X-Secret-Key` does not match the configured
/// secret. The presented value is never logged or echoed.
pub async fn require_secret(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request.headers().get(SECRET_HEADER).map(|v| v.as_bytes());
    let authorized = match presented {
        Some(value) => !state.secret.is_empty() && secrets_match(value, state.secret.as_bytes()),
        None => false,
    };

    if authorized {
        return next.run(request).await;
    }

    warn!(
        path = %request.uri().path(),
        header_present = presented.is_some(),
        "rejected request with invalid secret key"
    );
    error_response("", "invalid or missing secret key", StatusCode::UNAUTHORIZED).into_response()
}

/// Equality check whose running time does not depend on where the inputs
/// first differ.
fn secrets_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
