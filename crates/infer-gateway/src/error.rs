//! Maps the crate-wide `PipelineError` to HTTP status codes and JSON
//! bodies. This is the only place in the workspace allowed to know about
//! axum's `IntoResponse`.

use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use infer_kernel::PipelineError;
use serde_json::json;

pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_label = self.0.status_label();
        let (status, retry_after) = match &self.0 {
            PipelineError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            PipelineError::ModelNotReady { .. } => (StatusCode::SERVICE_UNAVAILABLE, Some(5u64)),
            PipelineError::FeatureStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            PipelineError::Predictor(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            PipelineError::Load(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            PipelineError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            PipelineError::Timeout => (StatusCode::GATEWAY_TIMEOUT, None),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = Json(json!({
            "error": {
                "status": status_label,
                "message": self.0.to_string(),
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response.headers_mut().insert(
                HeaderName::from_static("retry-after"),
                seconds.to_string().parse().unwrap(),
            );
        }
        response
    }
}
