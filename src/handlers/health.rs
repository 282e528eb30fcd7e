use axum::Json;
use serde_json::{Value, json};

/// GET /healthz
pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
