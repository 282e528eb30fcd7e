use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header, request::Parts},
    routing::{get, post},
};
use backon::ExponentialBuilder;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::db::UserStorage;
use crate::error::GateError;
use crate::handlers::{
    admin::upstream_status_handler,
    auth::{login_handler, me_handler, register_handler},
    health::health_handler,
    proxy::forward_handler,
};
use crate::service::token::TokenService;
use crate::service::upstream_actor::UpstreamHandle;

#[derive(Clone)]
pub struct GateState {
    pub storage: UserStorage,
    pub tokens: TokenService,
    pub upstreams: UpstreamHandle,
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
    pub client: reqwest::Client,
    pub retry: ExponentialBuilder,
    pub admin_key: Arc<str>,
    pub allowed_origins: Arc<[String]>,
    pub max_body_bytes: usize,
}

impl GateState {
    pub fn new(
        storage: UserStorage,
        upstreams: UpstreamHandle,
        cfg: &Config,
    ) -> Result<Self, GateError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.proxy.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.proxy.request_timeout_secs))
            .build()?;

        let per_minute = NonZeroU32::new(cfg.auth.login_attempts_per_minute)
            .unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            storage,
            tokens: TokenService::from_config(&cfg.auth),
            upstreams,
            login_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            client,
            retry: ExponentialBuilder::default().with_max_times(cfg.proxy.retry_attempts),
            admin_key: Arc::from(cfg.basic.admin_key.as_str()),
            allowed_origins: Arc::from(cfg.cors.allowed_origins.as_slice()),
            max_body_bytes: cfg.basic.max_body_bytes,
        })
    }
}

pub fn gate_router(state: GateState) -> Router {
    let cors = cors_layer(state.allowed_origins.clone());
    let max_body = state.max_body_bytes;

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/internal/upstreams", get(upstream_status_handler))
        .fallback(forward_handler)
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

/// Browser clients (the SPA dev servers) arrive from localhost on arbitrary
/// ports, so origins are matched on scheme+host with any port.
fn cors_layer(allowed_origins: Arc<[String]>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| origin_allowed(o, &allowed_origins))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([
            header::AUTHORIZATION,
            header::HeaderName::from_static(crate::handlers::proxy::X_USER_ID),
            header::HeaderName::from_static(crate::handlers::proxy::X_USER_ROLE),
        ])
        .max_age(Duration::from_secs(3600))
}

/// `http://localhost` allows `http://localhost:5173` and `http://localhost`,
/// but not `http://localhost.evil.example`.
fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|base| {
        origin == base.as_str()
            || (origin.starts_with(base.as_str()) && origin.as_bytes()[base.len()] == b':')
    })
}
