use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use url::Url;

use crate::api::upstream::UpstreamApi;
use crate::error::GateError;
use crate::middleware::forward::ForwardPreprocess;
use crate::router::GateState;
use crate::service::token::Claims;
use crate::service::upstream_actor::ResolvedRoute;

pub const X_USER_ID: &str = "x-user-id";
pub const X_USER_ROLE: &str = "x-user-role";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fallback handler: everything the router does not serve locally is
/// forwarded to the upstream matched by the route table.
pub async fn forward_handler(
    State(state): State<GateState>,
    ForwardPreprocess(ctx): ForwardPreprocess,
    req: Request,
) -> Result<Response, GateError> {
    let (parts, body) = req.into_parts();

    // Buffered so retries can replay it; responses stream through untouched.
    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| GateError::BodyTooLarge)?;

    let url = build_upstream_url(&ctx.route, parts.uri.path(), parts.uri.query())?;
    let headers = filter_request_headers(&parts.headers, ctx.claims.as_ref());

    let result = UpstreamApi::try_forward(
        state.client.clone(),
        parts.method.clone(),
        url,
        headers,
        body,
        state.retry,
    )
    .await;

    let resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            state.upstreams.report_failure(ctx.route.id.clone()).await;
            return Err(e.into());
        }
    };

    if resp.status().is_server_error() {
        state.upstreams.report_failure(ctx.route.id.clone()).await;
    } else {
        state.upstreams.report_success(ctx.route.id.clone()).await;
    }

    let status = resp.status();
    let headers = filter_response_headers(resp.headers());
    Ok((status, headers, Body::from_stream(resp.bytes_stream())).into_response())
}

fn build_upstream_url(
    route: &ResolvedRoute,
    path: &str,
    query: Option<&str>,
) -> Result<Url, GateError> {
    let tail = if route.strip_prefix {
        let stripped = path.strip_prefix(route.prefix.as_str()).unwrap_or(path);
        if stripped.is_empty() { "/" } else { stripped }
    } else {
        path
    };

    let mut target = format!("{}{}", route.upstream.as_str().trim_end_matches('/'), tail);
    if let Some(q) = query {
        target.push('?');
        target.push_str(q);
    }
    Url::parse(&target).map_err(Into::into)
}

/// Copy request headers, dropping hop-by-hop and framing headers plus any
/// inbound identity headers, then re-inject identity from verified claims.
fn filter_request_headers(headers: &HeaderMap, claims: Option<&Claims>) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_BY_HOP.contains(&name_str)
            || name_str == "host"
            || name_str == "content-length"
            || name_str == X_USER_ID
            || name_str == X_USER_ROLE
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    if let Some(claims) = claims {
        if let Ok(value) = HeaderValue::from_str(&claims.sub) {
            out.insert(X_USER_ID, value);
        }
        if let Ok(value) = HeaderValue::from_str(claims.role.as_str()) {
            out.insert(X_USER_ROLE, value);
        }
    }
    out
}

fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_BY_HOP.contains(&name_str) || name_str == "content-length" {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
