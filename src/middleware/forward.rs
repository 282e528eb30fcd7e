use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use crate::error::GateError;
use crate::middleware::auth::authenticate;
use crate::router::GateState;
use crate::service::token::Claims;
use crate::service::upstream_actor::{ResolvedRoute, RouteDecision};

/// Everything the forwarder needs before the body is touched: the matched
/// route and, for protected routes, the verified claims.
#[derive(Debug)]
pub struct ForwardContext {
    pub route: ResolvedRoute,
    pub claims: Option<Claims>,
}

pub struct ForwardPreprocess(pub ForwardContext);

impl FromRequestParts<GateState> for ForwardPreprocess {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GateState,
    ) -> Result<Self, Self::Rejection> {
        let decision = state
            .upstreams
            .resolve(parts.uri.path())
            .await
            .map_err(IntoResponse::into_response)?;

        let route = match decision {
            RouteDecision::Forward(route) => route,
            RouteDecision::Unavailable { id } => {
                return Err(GateError::UpstreamDown(id).into_response());
            }
            RouteDecision::NoRoute => return Err(GateError::RouteNotFound.into_response()),
        };

        let claims = if route.require_auth {
            let claims = authenticate(&parts.headers, &state.tokens)
                .map_err(IntoResponse::into_response)?;
            Some(claims)
        } else {
            None
        };

        Ok(Self(ForwardContext { route, claims }))
    }
}
