//! Liveness check.

use axum::Json;
use serde_json::{Value, json};

/// GET /health — reports that the process is serving requests.
pub async fn check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
