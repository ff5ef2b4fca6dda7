//! Shared types, traits and the error taxonomy for the inference server.
//!
//! This crate has no dependency on any other `infer-*` crate and no
//! knowledge of axum, reqwest, or any transport. Everything downstream
//! builds on these definitions.

pub mod error;
pub mod model;
pub mod request;
pub mod schema;

pub use error::{PipelineError, PipelineResult};
pub use model::{
    FeatureKey, FeatureRow, FingerprintKey, ModelHandle, Predictor, PredictorCapabilities,
    PredictorKind, Stage, Version,
};
pub use request::{
    BatchInstance, BatchItemResult, BatchPredictionRequest, BatchPredictionResponse,
    PredictionRequest, PredictionResponse,
};
pub use schema::{Dtype, FeatureValue, FieldSpec, InputSchema, Transform};
