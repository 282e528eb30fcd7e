use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::GateError;
use crate::middleware::auth::AuthenticatedUser;
use crate::router::GateState;
use crate::service::password;
use crate::types::auth::{LoginRequest, LoginResponse, RegistrationRequest, Role};

/// POST /api/auth/register
pub async fn register_handler(
    State(state): State<GateState>,
    Json(req): Json<RegistrationRequest>,
) -> Result<Response, GateError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(GateError::Validation("Username is required".to_string()));
    }
    if !valid_username(username) {
        return Err(GateError::Validation(
            "Username may only contain letters, digits, and . _ - @ (max 64 chars)".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(GateError::Validation("Password is required".to_string()));
    }
    let Some(role_name) = req.role.as_deref() else {
        return Err(GateError::Validation("Role is required".to_string()));
    };
    let Some(role) = Role::from_name(role_name) else {
        return Err(GateError::Validation("Invalid role".to_string()));
    };
    if !password::is_strong(&req.password) {
        return Err(GateError::Validation(
            "Password must be at least 8 characters and contain letters and numbers".to_string(),
        ));
    }
    if state.storage.exists_by_username(username).await? {
        return Err(GateError::UsernameTaken);
    }

    let password_hash = password::hash(&req.password)?;
    // insert re-checks the UNIQUE constraint, covering the race with a
    // concurrent registration
    state
        .storage
        .insert_user(crate::db::NewUser {
            username: username.to_string(),
            password_hash,
            role,
        })
        .await?;

    info!(username, role = %role, "new user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    )
        .into_response())
}

/// POST /api/auth/login
pub async fn login_handler(
    State(state): State<GateState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, GateError> {
    if state.login_limiter.check_key(&req.username).is_err() {
        warn!(username = %req.username, "login rate limit hit");
        return Err(GateError::RateLimited);
    }

    let Some(user) = state.storage.find_by_username(&req.username).await? else {
        warn!(username = %req.username, "failed login attempt");
        return Err(GateError::InvalidCredentials);
    };
    if !password::verify(&req.password, &user.password_hash)? {
        warn!(username = %req.username, "failed login attempt");
        return Err(GateError::InvalidCredentials);
    }

    let token = state.tokens.issue(&user.username, user.role)?;
    state.storage.record_login(user.id).await?;
    info!(username = %user.username, "user logged in");

    Ok(Json(LoginResponse {
        token,
        username: user.username,
        expires_in: state.tokens.ttl_secs(),
    })
    .into_response())
}

/// GET /api/auth/me — echoes the verified claims.
pub async fn me_handler(AuthenticatedUser(claims): AuthenticatedUser) -> Json<Value> {
    Json(json!({"username": claims.sub, "role": claims.role}))
}

/// Usernames end up in the `X-User-Id` header on proxied requests, so the
/// charset must stay header-safe.
fn valid_username(username: &str) -> bool {
    username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'))
}
