//! Axum HTTP server: router construction and the bind-and-serve loop.

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::watch;
use tracing::info;

use crate::handlers::{health, metrics, models, predict};
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics))
        .route("/models", get(models::list_models))
        .route("/models/reload", post(models::reload_models))
        .route("/predict", post(predict::predict))
        .route("/predict/batch", post(predict::predict_batch))
        .with_state(state)
}

/// Bind and serve until `shutdown` fires, then wait up to `deadline` for
/// in-flight requests to finish before returning.
pub async fn serve(
    listen_addr: &str,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = listen_addr, "inferd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("shutdown signal received, draining in-flight requests");
        })
        .await
}
