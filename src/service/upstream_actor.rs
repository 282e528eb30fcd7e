//! Actor owning the route table and per-upstream health.
//!
//! All state transitions are serialized through the actor mailbox; handlers
//! talk to it through [`UpstreamHandle`]. An upstream that accumulates
//! `max_failures` consecutive failures is taken out of rotation for the
//! configured cooldown and restored lazily on the next resolve.

use crate::config::{ProxyConfig, RouteRule};
use crate::error::GateError;
use crate::service::route_table::RouteTable;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub type RouteId = String;

/// Route data a forwarder needs, detached from actor state.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub id: RouteId,
    pub prefix: String,
    pub upstream: url::Url,
    pub require_auth: bool,
    pub strip_prefix: bool,
}

#[derive(Debug)]
pub enum RouteDecision {
    Forward(ResolvedRoute),
    Unavailable { id: RouteId },
    NoRoute,
}

/// Health snapshot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamStatus {
    pub id: String,
    pub prefix: String,
    pub upstream: String,
    pub require_auth: bool,
    pub healthy: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
pub enum UpstreamActorMessage {
    /// Resolve a request path to a forwarding decision.
    Resolve(String, RpcReplyPort<RouteDecision>),
    /// Report a transport failure or upstream 5xx.
    ReportFailure { id: RouteId },
    /// Report a successful exchange; resets the failure count.
    ReportSuccess { id: RouteId },
    /// Snapshot per-route health.
    Status(RpcReplyPort<Vec<UpstreamStatus>>),
}

/// Handle for interacting with the upstream actor.
#[derive(Clone)]
pub struct UpstreamHandle {
    actor: ActorRef<UpstreamActorMessage>,
}

impl UpstreamHandle {
    pub async fn resolve(&self, path: impl AsRef<str>) -> Result<RouteDecision, GateError> {
        ractor::call!(
            self.actor,
            UpstreamActorMessage::Resolve,
            path.as_ref().to_string()
        )
        .map_err(|e| GateError::Actor(format!("Resolve RPC failed: {e}")))
    }

    pub async fn report_failure(&self, id: RouteId) {
        let _ = ractor::cast!(self.actor, UpstreamActorMessage::ReportFailure { id });
    }

    pub async fn report_success(&self, id: RouteId) {
        let _ = ractor::cast!(self.actor, UpstreamActorMessage::ReportSuccess { id });
    }

    pub async fn status(&self) -> Result<Vec<UpstreamStatus>, GateError> {
        ractor::call!(self.actor, UpstreamActorMessage::Status)
            .map_err(|e| GateError::Actor(format!("Status RPC failed: {e}")))
    }
}

struct RouteHealth {
    failures: u32,
    down_until: Option<Instant>,
}

struct UpstreamActorState {
    table: RouteTable,
    health: Vec<RouteHealth>,
    max_failures: u32,
    cooldown: Duration,
}

struct UpstreamActor;

#[ractor::async_trait]
impl Actor for UpstreamActor {
    type Msg = UpstreamActorMessage;
    type State = UpstreamActorState;
    type Arguments = (Vec<RouteRule>, ProxyConfig);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (rules, cfg): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let health = rules
            .iter()
            .map(|_| RouteHealth {
                failures: 0,
                down_until: None,
            })
            .collect();
        let table = RouteTable::new(rules);

        info!(
            routes = table.len(),
            max_failures = cfg.max_failures,
            cooldown_secs = cfg.cooldown_secs,
            "upstream actor initialized"
        );

        Ok(UpstreamActorState {
            table,
            health,
            max_failures: cfg.max_failures.max(1),
            cooldown: Duration::from_secs(cfg.cooldown_secs),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            UpstreamActorMessage::Resolve(path, reply) => {
                let _ = reply.send(Self::decide(state, &path));
            }
            UpstreamActorMessage::ReportFailure { id } => {
                Self::handle_report_failure(state, &id);
            }
            UpstreamActorMessage::ReportSuccess { id } => {
                Self::handle_report_success(state, &id);
            }
            UpstreamActorMessage::Status(reply) => {
                let _ = reply.send(Self::snapshot(state));
            }
        }
        Ok(())
    }
}

impl UpstreamActor {
    fn decide(state: &mut UpstreamActorState, path: &str) -> RouteDecision {
        let Some(idx) = state.table.match_index(path) else {
            return RouteDecision::NoRoute;
        };
        let rule = &state.table.rules()[idx];
        let health = &mut state.health[idx];

        if let Some(until) = health.down_until {
            if Instant::now() < until {
                return RouteDecision::Unavailable {
                    id: rule.id.clone(),
                };
            }
            // cooldown elapsed; restore lazily on first resolve
            health.down_until = None;
            health.failures = 0;
            info!(route = %rule.id, "cooldown elapsed; upstream restored");
        }

        RouteDecision::Forward(ResolvedRoute {
            id: rule.id.clone(),
            prefix: rule.prefix.clone(),
            upstream: rule.upstream.clone(),
            require_auth: rule.require_auth,
            strip_prefix: rule.strip_prefix,
        })
    }

    fn handle_report_failure(state: &mut UpstreamActorState, id: &str) {
        let Some(idx) = Self::index_of(state, id) else {
            return;
        };
        let health = &mut state.health[idx];
        if health.down_until.is_some() {
            return;
        }
        health.failures += 1;
        if health.failures >= state.max_failures {
            health.down_until = Some(Instant::now() + state.cooldown);
            warn!(
                route = id,
                failures = health.failures,
                cooldown_secs = state.cooldown.as_secs(),
                "upstream marked unavailable"
            );
        }
    }

    fn handle_report_success(state: &mut UpstreamActorState, id: &str) {
        let Some(idx) = Self::index_of(state, id) else {
            return;
        };
        state.health[idx].failures = 0;
    }

    fn index_of(state: &UpstreamActorState, id: &str) -> Option<usize> {
        state.table.rules().iter().position(|rule| rule.id == id)
    }

    fn snapshot(state: &UpstreamActorState) -> Vec<UpstreamStatus> {
        state
            .table
            .rules()
            .iter()
            .zip(&state.health)
            .map(|(rule, health)| UpstreamStatus {
                id: rule.id.clone(),
                prefix: rule.prefix.clone(),
                upstream: rule.upstream.to_string(),
                require_auth: rule.require_auth,
                healthy: health.down_until.is_none(),
                consecutive_failures: health.failures,
            })
            .collect()
    }
}

pub async fn spawn(rules: Vec<RouteRule>, cfg: &ProxyConfig) -> Result<UpstreamHandle, GateError> {
    let (actor, _join) = Actor::spawn(None, UpstreamActor, (rules, cfg.clone()))
        .await
        .map_err(|e| GateError::Actor(format!("upstream actor spawn failed: {e}")))?;
    Ok(UpstreamHandle { actor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn rules() -> Vec<RouteRule> {
        vec![RouteRule {
            id: "students".to_string(),
            prefix: "/api/students".to_string(),
            upstream: Url::parse("http://127.0.0.1:9000").expect("parse upstream"),
            require_auth: true,
            strip_prefix: false,
        }]
    }

    fn proxy_cfg(max_failures: u32, cooldown_secs: u64) -> ProxyConfig {
        ProxyConfig {
            max_failures,
            cooldown_secs,
            ..ProxyConfig::default()
        }
    }

    #[tokio::test]
    async fn resolves_known_and_unknown_paths() {
        let handle = spawn(rules(), &proxy_cfg(3, 30)).await.expect("spawn actor");

        match handle.resolve("/api/students/42").await.expect("resolve") {
            RouteDecision::Forward(route) => {
                assert_eq!(route.id, "students");
                assert!(route.require_auth);
            }
            other => panic!("expected Forward, got {other:?}"),
        }
        match handle.resolve("/api/unknown").await.expect("resolve") {
            RouteDecision::NoRoute => {}
            other => panic!("expected NoRoute, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_below_threshold_keep_forwarding() {
        let handle = spawn(rules(), &proxy_cfg(3, 30)).await.expect("spawn actor");

        handle.report_failure("students".to_string()).await;
        handle.report_failure("students".to_string()).await;

        match handle.resolve("/api/students").await.expect("resolve") {
            RouteDecision::Forward(_) => {}
            other => panic!("expected Forward, got {other:?}"),
        }

        let status = handle.status().await.expect("status");
        assert_eq!(status[0].consecutive_failures, 2);
        assert!(status[0].healthy);
    }

    #[tokio::test]
    async fn threshold_failures_take_upstream_down() {
        let handle = spawn(rules(), &proxy_cfg(2, 60)).await.expect("spawn actor");

        handle.report_failure("students".to_string()).await;
        handle.report_failure("students".to_string()).await;

        match handle.resolve("/api/students").await.expect("resolve") {
            RouteDecision::Unavailable { id } => assert_eq!(id, "students"),
            other => panic!("expected Unavailable, got {other:?}"),
        }

        let status = handle.status().await.expect("status");
        assert!(!status[0].healthy);
    }

    #[tokio::test]
    async fn elapsed_cooldown_restores_upstream() {
        let handle = spawn(rules(), &proxy_cfg(1, 0)).await.expect("spawn actor");

        handle.report_failure("students".to_string()).await;

        // zero cooldown: the next resolve restores the route
        match handle.resolve("/api/students").await.expect("resolve") {
            RouteDecision::Forward(_) => {}
            other => panic!("expected Forward after cooldown, got {other:?}"),
        }

        let status = handle.status().await.expect("status");
        assert!(status[0].healthy);
        assert_eq!(status[0].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let handle = spawn(rules(), &proxy_cfg(3, 30)).await.expect("spawn actor");

        handle.report_failure("students".to_string()).await;
        handle.report_success("students".to_string()).await;

        let status = handle.status().await.expect("status");
        assert_eq!(status[0].consecutive_failures, 0);
    }
}
