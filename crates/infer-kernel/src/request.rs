//! Wire-level request/response types for the prediction pipeline. These
//! are the shapes `infer-gateway` deserializes from/serializes to JSON;
//! `infer-pipeline` only deals in `ModelHandle` + assembled feature
//! vectors once a request has been resolved against the schema.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::schema::FeatureValue;

/// A single prediction request as received over HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub model_name: String,
    /// `None` resolves to the model's current production version.
    pub version: Option<u64>,
    #[serde(default)]
    pub entity_id: String,
    /// Features supplied inline by the caller; merged with any fetched
    /// from the feature store, inline values taking precedence.
    #[serde(default)]
    pub features: HashMap<String, FeatureValue>,
    #[serde(default)]
    pub request_proba: bool,
}

/// One instance within a batch call — everything `PredictionRequest` needs
/// except the model name, which the batch shares across all instances.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchInstance {
    pub version: Option<u64>,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub features: HashMap<String, FeatureValue>,
    #[serde(default)]
    pub request_proba: bool,
}

impl BatchInstance {
    pub fn into_request(self, model_name: String) -> PredictionRequest {
        PredictionRequest {
            model_name,
            version: self.version,
            entity_id: self.entity_id,
            features: self.features,
            request_proba: self.request_proba,
        }
    }
}

/// A batch of instances against one model, sharing one HTTP call. Order is
/// preserved in the response; one instance's failure does not fail its
/// siblings.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchPredictionRequest {
    pub model_name: String,
    pub instances: Vec<BatchInstance>,
}

/// A successful prediction result.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub model_name: String,
    pub version: u64,
    pub prediction: f64,
    pub proba: Option<f64>,
    pub cache_hit: bool,
    /// Wall-clock time for this call, end to end — cache lookup, feature
    /// resolution, and inference if it wasn't a cache hit.
    pub latency_ms: f64,
}

/// One slot in a batch response: either a prediction or the error status
/// label that would have been returned had this been a solo request.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItemResult {
    Ok(PredictionResponse),
    Err { error: String, status: &'static str },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchPredictionResponse {
    pub results: Vec<BatchItemResult>,
}
