use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::authorization::{Authorization, Bearer};
use tracing::debug;

use crate::error::GateError;
use crate::router::GateState;
use crate::service::token::{Claims, TokenService};

/// Ensure the inbound request carries a valid bearer token.
/// Requires `Authorization: Bearer <jwt>`; the token must verify against the
/// gateway's secret and issuer.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<Claims, GateError> {
    let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Err(GateError::Unauthorized(
            "missing Authorization header".to_string(),
        ));
    };

    let auth = auth.trim();
    let Some(token) = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
    else {
        return Err(GateError::Unauthorized(
            "malformed Authorization header; expected a Bearer token".to_string(),
        ));
    };

    tokens.verify(token).map_err(|e| {
        debug!(error = %e, "token rejected");
        GateError::Unauthorized("invalid or expired token".to_string())
    })
}

/// Extractor form of [`authenticate`] for locally served routes.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl FromRequestParts<GateState> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GateState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                GateError::Unauthorized(
                    "missing or malformed Authorization header".to_string(),
                )
                .into_response()
            })?;

        let claims = state.tokens.verify(bearer.token()).map_err(|e| {
            debug!(error = %e, "token rejected");
            GateError::Unauthorized("invalid or expired token".to_string()).into_response()
        })?;
        Ok(Self(claims))
    }
}
