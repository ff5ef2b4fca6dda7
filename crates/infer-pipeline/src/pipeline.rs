//! The nine-step prediction pipeline. Concurrency note: steps 2-8 touch no
//! global lock of their own — the prediction cache and telemetry are the
//! only shared mutable state, and both offer narrow, lock-free critical
//! sections internally.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use infer_kernel::{
    FeatureKey, FeatureValue, ModelHandle, PipelineError, PredictionRequest, PredictionResponse,
};
use infer_models::{compute_fingerprint, CacheEntry, ModelManager, PredictionCache};
use infer_features::FeatureStoreClient;
use infer_telemetry::Telemetry;

pub struct Pipeline {
    manager: Arc<ModelManager>,
    prediction_cache: Arc<PredictionCache>,
    feature_store: Arc<FeatureStoreClient>,
    telemetry: Arc<Telemetry>,
}

impl Pipeline {
    pub fn new(
        manager: Arc<ModelManager>,
        prediction_cache: Arc<PredictionCache>,
        feature_store: Arc<FeatureStoreClient>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            manager,
            prediction_cache,
            feature_store,
            telemetry,
        }
    }

    /// Step 1: structural validation the deserializer doesn't already
    /// guarantee.
    fn validate_shape(request: &PredictionRequest) -> Result<(), PipelineError> {
        if request.model_name.trim().is_empty() {
            return Err(PipelineError::Validation("model_name must not be empty".into()));
        }
        Ok(())
    }

    /// Step 2: resolve the handle to serve this request against.
    fn resolve_handle(&self, request: &PredictionRequest) -> Result<Arc<ModelHandle>, PipelineError> {
        match request.version {
            None => self
                .manager
                .current(&request.model_name)
                .ok_or_else(|| PipelineError::ModelNotReady {
                    model_name: request.model_name.clone(),
                }),
            Some(version) => self
                .manager
                .handle_for_version(&request.model_name, version)
                .ok_or_else(|| PipelineError::ModelNotReady {
                    model_name: request.model_name.clone(),
                }),
        }
    }

    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse, PipelineError> {
        let start = Instant::now();
        let mut result = self.predict_inner(&request).await;
        let elapsed = start.elapsed().as_secs_f64();

        let (model_name, version, status) = match &mut result {
            Ok(resp) => {
                resp.latency_ms = elapsed * 1000.0;
                (
                    resp.model_name.clone(),
                    resp.version,
                    if resp.cache_hit { "cache_hit" } else { "success" },
                )
            }
            Err(e) => (request.model_name.clone(), 0, e.status_label()),
        };
        self.telemetry.record_prediction(&model_name, version, status, elapsed);

        result
    }

    async fn predict_inner(&self, request: &PredictionRequest) -> Result<PredictionResponse, PipelineError> {
        Self::validate_shape(request)?;

        let handle = self.resolve_handle(request)?;

        let filled = handle
            .input_schema
            .validate_and_fill(request.features.clone())?;

        let fingerprint = compute_fingerprint(&handle.name, handle.version, &filled);
        if let Some(entry) = self.prediction_cache.get(&fingerprint) {
            self.telemetry.prediction_cache_hits_total.inc();
            return Ok(PredictionResponse {
                model_name: handle.name.clone(),
                version: handle.version,
                prediction: entry.prediction,
                proba: if request.request_proba { entry.proba } else { None },
                cache_hit: true,
                // Stamped by the outer `predict` wrapper once total elapsed
                // time is known.
                latency_ms: 0.0,
            });
        }
        self.telemetry.prediction_cache_misses_total.inc();

        let merged = self.merge_supplementary_features(request, filled).await?;

        let vector = handle.input_schema.assemble_vector(&merged);
        if vector.len() != handle.predictor.input_arity() {
            return Err(PipelineError::Validation(format!(
                "assembled vector width {} does not match predictor arity {}",
                vector.len(),
                handle.predictor.input_arity()
            )));
        }

        let prediction = handle.predictor.predict(&vector)?;
        let proba = if request.request_proba && handle.capabilities.supports_proba {
            Some(handle.predictor.predict_proba(&vector)?)
        } else {
            None
        };

        self.prediction_cache.insert(
            fingerprint,
            CacheEntry {
                prediction,
                proba,
            },
        );

        Ok(PredictionResponse {
            model_name: handle.name.clone(),
            version: handle.version,
            prediction,
            proba,
            cache_hit: false,
            // Stamped by the outer `predict` wrapper once total elapsed
            // time is known.
            latency_ms: 0.0,
        })
    }

    /// Step 5: supplementary features from the store, keyed by `entity_id`.
    /// Request-supplied values always win over store values.
    async fn merge_supplementary_features(
        &self,
        request: &PredictionRequest,
        mut filled: HashMap<String, FeatureValue>,
    ) -> Result<HashMap<String, FeatureValue>, PipelineError> {
        if request.entity_id.is_empty() {
            return Ok(filled);
        }
        let key = FeatureKey {
            entity_id: request.entity_id.clone(),
            group: request.model_name.clone(),
        };
        match self.feature_store.get(&key).await {
            Ok(Some(row)) => {
                self.telemetry.feature_cache_hits_total.inc();
                for (name, value) in row.values {
                    filled.entry(name).or_insert(value);
                }
                Ok(filled)
            }
            Ok(None) => {
                self.telemetry.feature_cache_misses_total.inc();
                Ok(filled)
            }
            Err(e) => {
                if request.features.is_empty() {
                    Err(e)
                } else {
                    // Supplementary only — the request already carried what
                    // it needs, so a store failure is not fatal here.
                    tracing::warn!(error = %e, "feature store lookup failed, continuing with request-supplied features only");
                    Ok(filled)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infer_features::{FeatureStoreConfig, InMemoryTabularStore};
    use infer_kernel::{Dtype, FieldSpec, InputSchema, Stage};
    use infer_models::{ModelManagerConfig, PredictionCacheConfig};
    use infer_registry::ArtifactPayload;

    fn encode_linear(weights: &[f64], bias: f64) -> Vec<u8> {
        let mut values = vec![bias];
        values.extend_from_slice(weights);
        let mut out = (values.len() as u32).to_le_bytes().to_vec();
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    async fn setup() -> (Pipeline, Arc<ModelManager>) {
        let telemetry = Arc::new(Telemetry::new().unwrap());
        let manager = Arc::new(ModelManager::new(ModelManagerConfig::default(), telemetry.clone()));
        let registry = infer_registry::MockRegistryClient::new();
        registry.set_versions(
            "fraud_detector",
            vec![infer_registry::VersionInfo {
                version: 1,
                stage: Stage::Production,
                aliases: vec![],
            }],
        );
        registry.set_artifact(
            "fraud_detector",
            1,
            ArtifactPayload {
                bytes: encode_linear(&[2.0], 1.0),
                schema_json: serde_json::to_value(InputSchema {
                    fields: vec![FieldSpec {
                        name: "amount".into(),
                        dtype: Dtype::F64,
                        required: true,
                        default: None,
                        transform: None,
                    }],
                })
                .unwrap(),
                predictor_kind: "linear".into(),
            },
        );
        manager
            .submit_load(&registry, "fraud_detector", 1, Stage::Production)
            .await
            .unwrap();

        let cache = Arc::new(PredictionCache::new(PredictionCacheConfig::default()));
        let feature_store = Arc::new(FeatureStoreClient::new(
            FeatureStoreConfig::default(),
            Arc::new(InMemoryTabularStore::new()),
        ));
        let pipeline = Pipeline::new(manager.clone(), cache, feature_store, telemetry);
        (pipeline, manager)
    }

    fn request(amount: f64) -> PredictionRequest {
        let mut features = HashMap::new();
        features.insert("amount".to_string(), FeatureValue::F64(amount));
        PredictionRequest {
            model_name: "fraud_detector".to_string(),
            version: None,
            entity_id: String::new(),
            features,
            request_proba: false,
        }
    }

    #[tokio::test]
    async fn predict_returns_miss_then_hit_on_repeat() {
        let (pipeline, _manager) = setup().await;
        let first = pipeline.predict(request(150.0)).await.unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.prediction, 301.0);

        let second = pipeline.predict(request(150.0)).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.prediction, 301.0);
    }

    #[tokio::test]
    async fn predict_rejects_missing_required_feature() {
        let (pipeline, _manager) = setup().await;
        let request = PredictionRequest {
            model_name: "fraud_detector".to_string(),
            version: None,
            entity_id: String::new(),
            features: HashMap::new(),
            request_proba: false,
        };
        let err = pipeline.predict(request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn predict_returns_model_not_ready_for_unknown_model() {
        let (pipeline, _manager) = setup().await;
        let request = PredictionRequest {
            model_name: "unknown_model".to_string(),
            version: None,
            entity_id: String::new(),
            features: HashMap::new(),
            request_proba: false,
        };
        let err = pipeline.predict(request).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotReady { .. }));
    }
}
