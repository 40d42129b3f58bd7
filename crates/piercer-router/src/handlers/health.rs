//! `GET /health` and `GET /api/info`.

use axum::Json;
use serde_json::{json, Value};

/// `GET /health`. A 200 response is the entire contract; callers should not
/// parse the body.
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/info`.
pub async fn info() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
