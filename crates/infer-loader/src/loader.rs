//! Builds a fully-validated `ModelHandle` from registry output: decode
//! artifact bytes into a closed predictor variant, parse the adjacent
//! schema, and self-check before anything is published.

use std::sync::Arc;
use std::time::Instant;

use infer_kernel::{InputSchema, ModelHandle, PipelineError, Predictor, PredictorCapabilities, Stage, Version};
use infer_registry::ArtifactPayload;

use crate::codec::read_f64_vec;
use crate::predictors::{BoostedEnsemblePredictor, LinearPredictor, Stump, TreeEnsemblePredictor};

fn build_stumps(flat: &[f64]) -> Result<Vec<Stump>, PipelineError> {
    if flat.len() % 4 != 0 {
        return Err(PipelineError::Load(format!(
            "stump payload length {} is not a multiple of 4",
            flat.len()
        )));
    }
    flat.chunks(4)
        .map(|c| {
            Ok(Stump {
                feature_idx: c[0] as usize,
                threshold: c[1],
                left_value: c[2],
                right_value: c[3],
            })
        })
        .collect()
}

/// Construct the closed predictor variant named by `predictor_kind` from
/// raw artifact bytes. Unknown kinds are a `Load` error — the core never
/// discovers predictor types at runtime.
pub fn build_predictor(
    predictor_kind: &str,
    bytes: &[u8],
    input_arity: usize,
) -> Result<Arc<dyn Predictor>, PipelineError> {
    match predictor_kind {
        "linear" => {
            let flat = read_f64_vec(bytes)?;
            if flat.len() != input_arity + 1 {
                return Err(PipelineError::Load(format!(
                    "linear artifact has {} values, expected {} (arity + bias)",
                    flat.len(),
                    input_arity + 1
                )));
            }
            let bias = flat[0];
            let weights = flat[1..].to_vec();
            Ok(Arc::new(LinearPredictor { weights, bias }))
        }
        "tree_ensemble" => {
            let flat = read_f64_vec(bytes)?;
            let stumps = build_stumps(&flat)?;
            if stumps.is_empty() {
                return Err(PipelineError::Load("tree ensemble has no stumps".into()));
            }
            Ok(Arc::new(TreeEnsemblePredictor {
                stumps,
                input_arity,
            }))
        }
        "boosted_ensemble" => {
            let flat = read_f64_vec(bytes)?;
            if flat.is_empty() {
                return Err(PipelineError::Load("boosted ensemble artifact is empty".into()));
            }
            let learning_rate = flat[0];
            let stumps = build_stumps(&flat[1..])?;
            if stumps.is_empty() {
                return Err(PipelineError::Load("boosted ensemble has no stumps".into()));
            }
            Ok(Arc::new(BoostedEnsemblePredictor {
                stumps,
                learning_rate,
                input_arity,
            }))
        }
        other => Err(PipelineError::Load(format!(
            "unknown predictor kind '{other}'"
        ))),
    }
}

fn capabilities_for(predictor_kind: &str) -> PredictorCapabilities {
    PredictorCapabilities {
        supports_proba: predictor_kind == "boosted_ensemble",
    }
}

/// Build and self-check a `ModelHandle` from a fetched artifact. Returns
/// `Load` on any schema mismatch, decode failure, or self-check failure —
/// never partially constructs a handle.
pub fn load_handle(
    name: &str,
    version: Version,
    stage: Stage,
    payload: ArtifactPayload,
) -> Result<ModelHandle, PipelineError> {
    let schema: InputSchema = serde_json::from_value(payload.schema_json)
        .map_err(|e| PipelineError::Load(format!("invalid schema descriptor: {e}")))?;
    let arity = schema.input_arity();
    let predictor = build_predictor(&payload.predictor_kind, &payload.bytes, arity)?;

    if predictor.input_arity() != arity {
        return Err(PipelineError::Load(format!(
            "predictor arity {} disagrees with schema arity {}",
            predictor.input_arity(),
            arity
        )));
    }
    predictor.validate()?;

    Ok(ModelHandle {
        name: name.to_string(),
        version,
        stage,
        loaded_at: Instant::now(),
        input_schema: Arc::new(schema),
        capabilities: capabilities_for(&payload.predictor_kind),
        predictor,
    })
}
