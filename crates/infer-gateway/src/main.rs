use std::sync::Arc;

use infer_features::{FeatureStoreClient, FeatureStoreConfig, InMemoryTabularStore};
use infer_gateway::config::ServerConfig;
use infer_gateway::state::AppState;
use infer_gateway::server;
use infer_models::{ModelManager, ModelManagerConfig, PredictionCache, PredictionCacheConfig};
use infer_pipeline::Pipeline;
use infer_poller::{ModelPoller, PollerConfig, SystemClock, TrackedModel};
use infer_registry::{HttpRegistryClient, RegistryClient};
use infer_telemetry::Telemetry;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration, exiting");
            std::process::exit(1);
        }
    };

    let telemetry = match Telemetry::new() {
        Ok(t) => Arc::new(t),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize telemetry registry, exiting");
            std::process::exit(1);
        }
    };

    let registry: Arc<dyn RegistryClient> = Arc::new(HttpRegistryClient::new(config.registry_base_url.clone()));
    let manager = Arc::new(ModelManager::new(
        ModelManagerConfig {
            drain_window: config.model_drain_window(),
        },
        telemetry.clone(),
    ));
    let prediction_cache = Arc::new(PredictionCache::new(PredictionCacheConfig {
        capacity: config.prediction_cache_capacity,
        ttl: config.prediction_cache_ttl(),
    }));
    let feature_store = Arc::new(FeatureStoreClient::new(
        FeatureStoreConfig {
            tier1_capacity: config.feature_cache_capacity,
            tier1_ttl: config.feature_cache_ttl(),
        },
        Arc::new(InMemoryTabularStore::new()),
    ));

    manager.preload(registry.as_ref(), &config.preload_models).await;

    let pipeline = Arc::new(Pipeline::new(
        manager.clone(),
        prediction_cache.clone(),
        feature_store,
        telemetry.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let tracked: Vec<TrackedModel> = config
        .preload_models
        .iter()
        .map(|(name, _)| TrackedModel {
            name: name.clone(),
            alias: "production".to_string(),
        })
        .collect();
    let poller = Arc::new(ModelPoller::new(
        manager.clone(),
        registry.clone(),
        prediction_cache.clone(),
        Arc::new(SystemClock),
        PollerConfig {
            interval: config.poller_interval(),
            jitter_fraction: config.poller_jitter_fraction,
        },
        tracked,
    ));
    tokio::spawn(poller.run(shutdown_rx.clone()));

    let state = AppState {
        manager,
        prediction_cache,
        pipeline,
        registry,
        telemetry,
        request_semaphore: Arc::new(tokio::sync::Semaphore::new(config.request_queue_capacity)),
        request_timeout: config.request_timeout(),
        preload_configured: !config.preload_models.is_empty(),
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    if let Err(e) = server::serve(&config.listen_addr, state, shutdown_rx).await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
