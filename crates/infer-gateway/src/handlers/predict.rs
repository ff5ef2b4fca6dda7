//! `POST /predict` and `POST /predict/batch`.

use axum::extract::State;
use axum::Json;
use futures::stream::{self, StreamExt};
use infer_kernel::{BatchPredictionRequest, BatchPredictionResponse, BatchItemResult, PipelineError, PredictionRequest, PredictionResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on concurrently in-flight instances within one batch call.
/// Admission control (`request_semaphore`) still bounds total concurrency
/// across the whole process; this just caps how much of one batch is
/// in flight at once.
const BATCH_CONCURRENCY: usize = 16;

/// Acquire an admission permit, then run the pipeline under the
/// configured request timeout. A request that can't acquire a permit or
/// that times out never reaches the model.
async fn predict_with_admission(
    state: &AppState,
    request: PredictionRequest,
) -> Result<PredictionResponse, PipelineError> {
    let _permit = state
        .request_semaphore
        .clone()
        .try_acquire_owned()
        .map_err(|_| PipelineError::Validation("request queue is full".to_string()))?;

    match tokio::time::timeout(state.request_timeout, state.pipeline.predict(request)).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout),
    }
}

pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let response = predict_with_admission(&state, request).await?;
    Ok(Json(response))
}

/// Each instance is resolved independently, up to `BATCH_CONCURRENCY` at a
/// time; one instance's failure becomes an `Err` slot rather than aborting
/// the batch. Results are reassembled in the caller's original order
/// regardless of which instance happens to finish first.
pub async fn predict_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchPredictionRequest>,
) -> Json<BatchPredictionResponse> {
    let model_name = batch.model_name;
    let total = batch.instances.len();

    let unordered: Vec<(usize, BatchItemResult)> = stream::iter(batch.instances.into_iter().enumerate())
        .map(|(i, instance)| {
            let state = state.clone();
            let model_name = model_name.clone();
            async move {
                let request = instance.into_request(model_name);
                let item = match predict_with_admission(&state, request).await {
                    Ok(response) => BatchItemResult::Ok(response),
                    Err(e) => BatchItemResult::Err {
                        error: e.to_string(),
                        status: e.status_label(),
                    },
                };
                (i, item)
            }
        })
        .buffer_unordered(BATCH_CONCURRENCY)
        .collect()
        .await;

    let mut slots: Vec<Option<BatchItemResult>> = (0..total).map(|_| None).collect();
    for (i, item) in unordered {
        slots[i] = Some(item);
    }
    let results = slots
        .into_iter()
        .map(|slot| slot.expect("every batch index is produced exactly once"))
        .collect();

    Json(BatchPredictionResponse { results })
}
