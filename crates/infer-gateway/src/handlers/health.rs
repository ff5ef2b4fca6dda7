//! `GET /health` (liveness) and `GET /ready` (readiness).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ready once at least one model has loaded. An empty model table is only
/// acceptable when no preload entries were configured — otherwise either
/// preload hasn't finished yet or every entry failed, and the gateway
/// can't serve a prediction.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let loaded = state.manager.loaded_models().len();
    if loaded == 0 && state.preload_configured {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "loaded_models": 0 })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "status": "ready", "loaded_models": loaded })),
    )
}
