//! `GET /models` and `POST /models/reload`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use infer_kernel::Stage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ModelSummary {
    name: String,
    version: u64,
    stage: Stage,
    loaded_at_secs_ago: u64,
}

pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let models: Vec<ModelSummary> = state
        .manager
        .summary()
        .into_iter()
        .map(|(name, (version, stage, loaded_at))| ModelSummary {
            name,
            version,
            stage,
            loaded_at_secs_ago: loaded_at.elapsed().as_secs(),
        })
        .collect();
    Json(json!({ "models": models }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ReloadRequest {
    pub name: Option<String>,
}

/// Triggers an out-of-band reconciliation against the registry for one
/// model, or every tracked model if `name` is omitted. Accepted
/// immediately — the actual reload is spawned onto its own task and the
/// handler replies before any of it runs.
pub async fn reload_models(
    State(state): State<AppState>,
    Json(body): Json<ReloadRequest>,
) -> (StatusCode, Json<Value>) {
    let targets: Vec<String> = match body.name {
        Some(name) => vec![name],
        None => state.manager.summary().into_keys().collect(),
    };

    tokio::spawn(run_reload(state, targets.clone()));

    (StatusCode::ACCEPTED, Json(json!({ "accepted": targets })))
}

async fn run_reload(state: AppState, targets: Vec<String>) {
    for name in &targets {
        match state.registry.resolve_alias(name, "production").await {
            Ok(Some(version)) => {
                match state
                    .manager
                    .submit_load(state.registry.as_ref(), name, version, Stage::Production)
                    .await
                {
                    Ok(_) => state.prediction_cache.invalidate_model(name),
                    Err(e) => tracing::warn!(model_name = name, error = %e, "on-demand reload failed"),
                }
            }
            Ok(None) => tracing::warn!(model_name = name, "reload: no production version resolved"),
            Err(e) => tracing::warn!(model_name = name, error = %e, "reload: alias resolution failed"),
        }
    }
}
