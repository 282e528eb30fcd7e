use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::error::GateError;
use crate::router::GateState;

const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// GET /internal/upstreams -> per-route health snapshot.
/// Guarded by `X-Admin-Key`; a wrong or missing key (or no configured key at
/// all) yields 404 so the surface stays invisible.
pub async fn upstream_status_handler(
    State(state): State<GateState>,
    headers: HeaderMap,
) -> Result<Response, GateError> {
    if !admin_key_matches(&headers, &state.admin_key) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let status = state.upstreams.status().await?;
    Ok(Json(status).into_response())
}

fn admin_key_matches(headers: &HeaderMap, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let Some(provided) = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}
