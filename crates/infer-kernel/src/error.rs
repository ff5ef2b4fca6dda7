//! Crate-wide error taxonomy for the inference server.
//!
//! Every component returns one of these variants rather than an exception
//! crossing a component boundary. HTTP status mapping lives in
//! `infer-gateway`, which is the only crate allowed to know about axum.

use thiserror::Error;

/// Error taxonomy shared by every `infer-*` crate.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum PipelineError {
    /// Malformed request or schema mismatch. Recovered locally, returned as 4xx.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested model/version is not currently loaded.
    #[error("model not ready: {model_name}")]
    ModelNotReady { model_name: String },

    /// Transient I/O failure against the feature store (tier 1 or tier 2).
    #[error("feature store error: {0}")]
    FeatureStore(String),

    /// The predictor raised during inference. Non-retryable.
    #[error("predictor error: {0}")]
    Predictor(String),

    /// Artifact download, schema mismatch, or validation failure during a load.
    /// Non-fatal to the process — the Model Manager keeps the existing handle.
    #[error("load error: {0}")]
    Load(String),

    /// Fatal at startup only.
    #[error("config error: {0}")]
    Config(String),

    /// Deadline exceeded; child work was cancelled.
    #[error("request timed out")]
    Timeout,
}

impl PipelineError {
    /// The status label recorded on the `ml_predictions_total` counter.
    pub fn status_label(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation_error",
            PipelineError::ModelNotReady { .. } => "model_not_ready",
            PipelineError::FeatureStore(_) => "feature_store_error",
            PipelineError::Predictor(_) => "predictor_error",
            PipelineError::Load(_) => "load_error",
            PipelineError::Config(_) => "config_error",
            PipelineError::Timeout => "timeout",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
