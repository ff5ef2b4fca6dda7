//! Single background poller: on a jittered interval, resolve each tracked
//! model's desired version against the registry and submit a load if it
//! has moved. One logical poller per server; a tick never overlaps the
//! previous one because the loop body is awaited straight through before
//! the next sleep starts.

use std::sync::Arc;
use std::time::Duration;

use infer_models::{ModelManager, PredictionCache};
use infer_registry::RegistryClient;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct TrackedModel {
    pub name: String,
    pub alias: String,
}

pub struct PollerConfig {
    pub interval: Duration,
    /// Fraction of `interval` applied as jitter, split evenly above and
    /// below the base interval (default 0.1 -> ±10%).
    pub jitter_fraction: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            jitter_fraction: 0.1,
        }
    }
}

pub struct ModelPoller {
    manager: Arc<ModelManager>,
    registry: Arc<dyn RegistryClient>,
    cache: Arc<PredictionCache>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
    tracked: Vec<TrackedModel>,
}

impl ModelPoller {
    pub fn new(
        manager: Arc<ModelManager>,
        registry: Arc<dyn RegistryClient>,
        cache: Arc<PredictionCache>,
        clock: Arc<dyn Clock>,
        config: PollerConfig,
        tracked: Vec<TrackedModel>,
    ) -> Self {
        Self {
            manager,
            registry,
            cache,
            clock,
            config,
            tracked,
        }
    }

    fn jittered_interval(&self) -> Duration {
        let base_ms = self.config.interval.as_millis() as i64;
        let span = (base_ms as f64 * self.config.jitter_fraction) as i64;
        if span == 0 {
            return self.config.interval;
        }
        let offset = rand::thread_rng().gen_range(-span..=span);
        Duration::from_millis((base_ms + offset).max(0) as u64)
    }

    /// Reconcile every tracked model once: resolve its alias, submit a load
    /// if the resolved version differs from what's currently published, and
    /// sweep the drain set. Returns the number of models that were loaded or
    /// reloaded this tick.
    pub async fn run_once(&self) -> usize {
        let _ = self.clock.now_millis();
        let mut changed = 0;

        for model in &self.tracked {
            let desired = match self.registry.resolve_alias(&model.name, &model.alias).await {
                Ok(Some(v)) => v,
                Ok(None) => {
                    warn!(model_name = %model.name, alias = %model.alias, "alias did not resolve");
                    continue;
                }
                Err(e) => {
                    warn!(model_name = %model.name, error = %e, "poll tick failed to resolve alias");
                    continue;
                }
            };

            let current_version = self.manager.current(&model.name).map(|h| h.version);
            if current_version == Some(desired) {
                debug!(model_name = %model.name, version = desired, "already at desired version");
                continue;
            }

            match self
                .manager
                .submit_load(
                    self.registry.as_ref(),
                    &model.name,
                    desired,
                    infer_kernel::Stage::Production,
                )
                .await
            {
                Ok(_) => {
                    info!(model_name = %model.name, version = desired, "poller published new version");
                    self.cache.invalidate_model(&model.name);
                    changed += 1;
                }
                Err(e) => {
                    warn!(model_name = %model.name, version = desired, error = %e, "poller load failed, keeping existing handle");
                }
            }
        }

        let swept = self.manager.sweep_drain();
        if swept > 0 {
            debug!(swept, "drain sweep retired expired handles");
        }

        changed
    }

    /// Run forever, sleeping a jittered interval between ticks, until
    /// `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("poller shutting down");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.jittered_interval()) => {
                    self.run_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infer_kernel::{Dtype, FieldSpec, InputSchema, Stage};
    use infer_models::{ModelManagerConfig, PredictionCacheConfig};
    use infer_registry::{ArtifactPayload, MockRegistryClient, VersionInfo};
    use infer_telemetry::Telemetry;

    fn test_manager() -> ModelManager {
        ModelManager::new(ModelManagerConfig::default(), Arc::new(Telemetry::new().unwrap()))
    }

    struct FixedClock;
    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            0
        }
    }

    fn encode_linear(weights: &[f64], bias: f64) -> Vec<u8> {
        let mut values = vec![bias];
        values.extend_from_slice(weights);
        let mut out = (values.len() as u32).to_le_bytes().to_vec();
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn seed(registry: &MockRegistryClient, name: &str, version: u64) {
        registry.set_versions(
            name,
            vec![VersionInfo {
                version,
                stage: Stage::Production,
                aliases: vec!["production".to_string()],
            }],
        );
        let schema = InputSchema {
            fields: vec![FieldSpec {
                name: "amount".into(),
                dtype: Dtype::F64,
                required: true,
                default: None,
                transform: None,
            }],
        };
        registry.set_artifact(
            name,
            version,
            ArtifactPayload {
                bytes: encode_linear(&[1.0], 0.0),
                schema_json: serde_json::to_value(schema).unwrap(),
                predictor_kind: "linear".into(),
            },
        );
    }

    #[tokio::test]
    async fn run_once_loads_tracked_model_from_nothing() {
        let registry = Arc::new(MockRegistryClient::new());
        seed(&registry, "fraud_detector", 1);
        let manager = Arc::new(test_manager());
        let cache = Arc::new(PredictionCache::new(PredictionCacheConfig::default()));
        let poller = ModelPoller::new(
            manager.clone(),
            registry.clone(),
            cache,
            Arc::new(FixedClock),
            PollerConfig::default(),
            vec![TrackedModel {
                name: "fraud_detector".to_string(),
                alias: "production".to_string(),
            }],
        );

        let changed = poller.run_once().await;
        assert_eq!(changed, 1);
        assert_eq!(manager.current("fraud_detector").unwrap().version, 1);
    }

    #[tokio::test]
    async fn run_once_is_noop_when_already_at_desired_version() {
        let registry = Arc::new(MockRegistryClient::new());
        seed(&registry, "fraud_detector", 1);
        let manager = Arc::new(test_manager());
        let cache = Arc::new(PredictionCache::new(PredictionCacheConfig::default()));
        let poller = ModelPoller::new(
            manager.clone(),
            registry.clone(),
            cache,
            Arc::new(FixedClock),
            PollerConfig::default(),
            vec![TrackedModel {
                name: "fraud_detector".to_string(),
                alias: "production".to_string(),
            }],
        );

        poller.run_once().await;
        let second = poller.run_once().await;
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn run_once_detects_hot_swap_and_invalidates_cache() {
        let registry = Arc::new(MockRegistryClient::new());
        seed(&registry, "fraud_detector", 1);
        let manager = Arc::new(test_manager());
        let cache = Arc::new(PredictionCache::new(PredictionCacheConfig::default()));
        let poller = ModelPoller::new(
            manager.clone(),
            registry.clone(),
            cache.clone(),
            Arc::new(FixedClock),
            PollerConfig::default(),
            vec![TrackedModel {
                name: "fraud_detector".to_string(),
                alias: "production".to_string(),
            }],
        );
        poller.run_once().await;

        seed(&registry, "fraud_detector", 2);
        let changed = poller.run_once().await;
        assert_eq!(changed, 1);
        assert_eq!(manager.current("fraud_detector").unwrap().version, 2);
    }

    #[test]
    fn jittered_interval_stays_within_bound() {
        let poller = ModelPoller::new(
            Arc::new(test_manager()),
            Arc::new(MockRegistryClient::new()),
            Arc::new(PredictionCache::new(PredictionCacheConfig::default())),
            Arc::new(FixedClock),
            PollerConfig {
                interval: Duration::from_secs(60),
                jitter_fraction: 0.1,
            },
            vec![],
        );
        for _ in 0..50 {
            let d = poller.jittered_interval();
            assert!(d >= Duration::from_secs(54) && d <= Duration::from_secs(66));
        }
    }
}
