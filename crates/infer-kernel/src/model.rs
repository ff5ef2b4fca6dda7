//! The predictor contract and model lifecycle types shared across every
//! `infer-*` crate. `ModelManager` (in `infer-models`) swaps `ModelHandle`s
//! atomically; everything downstream only ever sees a fully-built one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::PipelineError;
use crate::schema::{FeatureValue, InputSchema};

/// A model version identifier. The registry is the source of truth for
/// ordering; callers never parse this as a semver.
pub type Version = u64;

/// Lifecycle stage a registry reports for a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Staging,
    Production,
    Archived,
    /// No version currently holds this stage for the model name.
    None,
}

/// What a predictor can do beyond a point prediction. `predict_proba` is a
/// capability, not a universal method — formalizes the open question from
/// the design notes rather than leaving it an implicit `unwrap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PredictorCapabilities {
    pub supports_proba: bool,
}

/// The closed set of predictor implementations. Dispatch is a `match`, not
/// a registry lookup — new kinds are added here, never discovered at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    TreeEnsemble,
    Linear,
    BoostedEnsemble,
}

/// A loaded, ready-to-serve model. Construction happens once in the loader;
/// after that a `Predictor` is only ever called, never mutated.
pub trait Predictor: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> PredictorKind;

    /// Number of scalar inputs this predictor expects, after schema
    /// transforms are applied. Used to validate the loaded artifact against
    /// its own declared schema before publishing the handle.
    fn input_arity(&self) -> usize;

    /// Point prediction over an already-assembled, schema-ordered vector.
    fn predict(&self, features: &[f64]) -> Result<f64, PipelineError>;

    /// Class probability, if `capabilities().supports_proba`. Callers must
    /// check the capability first; implementations that don't support it
    /// return `PipelineError::Predictor`.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, PipelineError>;

    /// Run the artifact's self-check vector (all zeros, schema-width) and
    /// confirm it returns a finite value. Called once at load time.
    fn validate(&self) -> Result<(), PipelineError> {
        let probe = vec![0.0; self.input_arity()];
        let out = self.predict(&probe)?;
        if out.is_finite() {
            Ok(())
        } else {
            Err(PipelineError::Load(
                "predictor self-check returned a non-finite value".to_string(),
            ))
        }
    }
}

/// An immutable, fully-validated model ready to be published into the
/// manager's atomic table. Everything needed to serve a request lives here
/// — no further I/O is required once a handle is in hand.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub name: String,
    pub version: Version,
    pub stage: Stage,
    pub loaded_at: Instant,
    pub input_schema: Arc<InputSchema>,
    pub predictor: Arc<dyn Predictor>,
    pub capabilities: PredictorCapabilities,
}

impl ModelHandle {
    pub fn validate_request(
        &self,
        features: std::collections::HashMap<String, FeatureValue>,
    ) -> Result<Vec<f64>, PipelineError> {
        let filled = self.input_schema.validate_and_fill(features)?;
        let vector = self.input_schema.assemble_vector(&filled);
        if vector.len() != self.predictor.input_arity() {
            return Err(PipelineError::Validation(format!(
                "assembled feature vector has width {}, predictor expects {}",
                vector.len(),
                self.predictor.input_arity()
            )));
        }
        Ok(vector)
    }
}

/// Identifies one entity's feature row within a named feature group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureKey {
    pub entity_id: String,
    pub group: String,
}

/// A feature row as returned by the feature store, carrying its own
/// version so callers can detect staleness relative to what a prediction
/// was computed against.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub key: FeatureKey,
    pub values: std::collections::HashMap<String, FeatureValue>,
    pub version: u64,
    pub fetched_at: Instant,
}

/// Canonical cache key for the prediction cache: model name, version, and a
/// normalized digest of the input features. Two logically-identical
/// requests always normalize to the same `FingerprintKey`, regardless of
/// field insertion order or trailing float precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintKey {
    pub model_name: String,
    pub version: Version,
    pub digest: u64,
}
