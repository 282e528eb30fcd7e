use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GateError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Actor error: {0}")]
    Actor(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Too many login attempts")]
    RateLimited,

    #[error("No route matches the requested path")]
    RouteNotFound,

    #[error("Upstream {0} is unavailable")]
    UpstreamDown(String),

    #[error("Request body too large")]
    BodyTooLarge,
}

impl IntoResponse for GateError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            GateError::Database(_)
            | GateError::Actor(_)
            | GateError::PasswordHash(_)
            | GateError::Token(_) => {
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            GateError::Unauthorized(reason) => {
                let body = ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: reason,
                };
                (StatusCode::UNAUTHORIZED, body)
            }
            GateError::InvalidCredentials => {
                let body = ApiErrorBody {
                    code: "INVALID_CREDENTIALS".to_string(),
                    message: "Invalid username or password.".to_string(),
                };
                (StatusCode::UNAUTHORIZED, body)
            }
            GateError::Validation(message) => {
                let body = ApiErrorBody {
                    code: "INVALID_REQUEST".to_string(),
                    message,
                };
                (StatusCode::BAD_REQUEST, body)
            }
            GateError::UsernameTaken => {
                let body = ApiErrorBody {
                    code: "USERNAME_TAKEN".to_string(),
                    message: "Username is already taken.".to_string(),
                };
                (StatusCode::BAD_REQUEST, body)
            }
            GateError::RateLimited => {
                let body = ApiErrorBody {
                    code: "RATE_LIMITED".to_string(),
                    message: "Too many login attempts; slow down.".to_string(),
                };
                (StatusCode::TOO_MANY_REQUESTS, body)
            }
            GateError::RouteNotFound => {
                let body = ApiErrorBody {
                    code: "NO_ROUTE".to_string(),
                    message: "No route matches the requested path.".to_string(),
                };
                (StatusCode::NOT_FOUND, body)
            }
            GateError::UpstreamDown(id) => {
                let body = ApiErrorBody {
                    code: "UPSTREAM_DOWN".to_string(),
                    message: format!("Upstream {id} is temporarily unavailable."),
                };
                (StatusCode::SERVICE_UNAVAILABLE, body)
            }
            GateError::BodyTooLarge => {
                let body = ApiErrorBody {
                    code: "PAYLOAD_TOO_LARGE".to_string(),
                    message: "Request body too large.".to_string(),
                };
                (StatusCode::PAYLOAD_TOO_LARGE, body)
            }
            GateError::Reqwest(_) | GateError::UrlParse(_) => {
                let body = ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Upstream service is unavailable.".to_string(),
                };
                (StatusCode::BAD_GATEWAY, body)
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
