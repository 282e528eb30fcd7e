use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

use campus_gate::config::Config;
use campus_gate::router::{GateState, gate_router};
use campus_gate::service::token::TokenService;
use campus_gate::service::upstream_actor;

fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "campus-gate-{}-{}-{}.sqlite",
        tag,
        std::process::id(),
        nanos
    ));
    temp_path
}

async fn test_app(cfg: &Config, tag: &str) -> (Router, PathBuf) {
    let db_path = temp_db_path(tag);
    let database_url = format!("sqlite:{}", db_path.display());
    let storage = campus_gate::db::connect(&database_url)
        .await
        .expect("connect test db");
    let upstreams = upstream_actor::spawn(cfg.routes.clone(), &cfg.proxy)
        .await
        .expect("spawn upstream actor");
    let state = GateState::new(storage, upstreams, cfg).expect("build state");
    (gate_router(state), db_path)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not json")
}

async fn register(app: &Router, username: &str, password: &str, role: &str) -> StatusCode {
    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            &json!({"username": username, "password": password, "role": role}),
        ))
        .await
        .expect("request failed");
    resp.status()
}

#[tokio::test]
async fn register_login_me_flow() {
    let cfg = Config::default();
    let (app, db_path) = test_app(&cfg, "flow").await;

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            &json!({"username": "alice", "password": "passw0rd1", "role": "STUDENT"}),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "User registered successfully");

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            &json!({"username": "alice", "password": "passw0rd1"}),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["expires_in"], cfg.auth.token_ttl_secs);

    let token = body["token"].as_str().expect("token missing").to_string();
    let claims = TokenService::from_config(&cfg.auth)
        .verify(&token)
        .expect("issued token should verify");
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.role, campus_gate::Role::Student);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "STUDENT");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn registration_is_validated() {
    let cfg = Config::default();
    let (app, db_path) = test_app(&cfg, "validation").await;

    let cases = [
        json!({"username": "", "password": "passw0rd1", "role": "STUDENT"}),
        json!({"username": "dave", "password": "passw0rd1"}),
        json!({"username": "dave", "password": "passw0rd1", "role": "ADMIN"}),
        json!({"username": "dave", "password": "short1", "role": "STUDENT"}),
        json!({"username": "dave", "password": "lettersonly", "role": "STUDENT"}),
        json!({"username": "dave mallory", "password": "passw0rd1", "role": "STUDENT"}),
        json!({"username": "dave", "password": "", "role": "STUDENT"}),
    ];

    for case in &cases {
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/register", case))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "case: {case}");
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_REQUEST", "case: {case}");
    }

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn duplicate_usernames_are_rejected() {
    let cfg = Config::default();
    let (app, db_path) = test_app(&cfg, "duplicate").await;

    assert_eq!(
        register(&app, "erin", "passw0rd1", "FACULTY").await,
        StatusCode::CREATED
    );
    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            &json!({"username": "erin", "password": "0therpass", "role": "STUDENT"}),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "USERNAME_TAKEN");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() {
    let cfg = Config::default();
    let (app, db_path) = test_app(&cfg, "badcreds").await;

    assert_eq!(
        register(&app, "bob", "passw0rd1", "INSTRUCTOR").await,
        StatusCode::CREATED
    );

    for body in [
        json!({"username": "bob", "password": "wrongpass1"}),
        json!({"username": "nobody", "password": "passw0rd1"}),
    ] {
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", &body))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let parsed = body_json(resp).await;
        assert_eq!(parsed["error"]["code"], "INVALID_CREDENTIALS");
    }

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let mut cfg = Config::default();
    cfg.auth.login_attempts_per_minute = 2;
    let (app, db_path) = test_app(&cfg, "ratelimit").await;

    let attempt = json!({"username": "frank", "password": "wrongpass1"});
    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", &attempt))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/login", &attempt))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn me_requires_a_token() {
    let cfg = Config::default();
    let (app, db_path) = test_app(&cfg, "me-noauth").await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn admin_surface_is_invisible_without_key() {
    let cfg = Config::default();
    let (app, db_path) = test_app(&cfg, "admin-off").await;

    // no admin key configured: always 404
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/internal/upstreams")
                .header("x-admin-key", "anything")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let _ = fs::remove_file(&db_path);
}

#[tokio::test]
async fn admin_surface_reports_route_health() {
    let mut cfg = Config::default();
    cfg.basic.admin_key = "s3cret".to_string();
    cfg.routes = vec![campus_gate::config::RouteRule {
        id: "students".to_string(),
        prefix: "/api/students".to_string(),
        upstream: url::Url::parse("http://127.0.0.1:9000").expect("parse upstream"),
        require_auth: true,
        strip_prefix: false,
    }];
    let (app, db_path) = test_app(&cfg, "admin-on").await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/internal/upstreams")
                .header("x-admin-key", "s3cret")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body[0]["id"], "students");
    assert_eq!(body[0]["healthy"], true);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/internal/upstreams")
                .header("x-admin-key", "wrong")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let _ = fs::remove_file(&db_path);
}
