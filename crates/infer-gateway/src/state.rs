//! Shared application state injected into every handler via axum's `State`
//! extractor. No global mutable singleton — everything a handler needs is
//! reached through this struct.

use std::sync::Arc;
use std::time::Duration;

use infer_models::{ModelManager, PredictionCache};
use infer_pipeline::Pipeline;
use infer_registry::RegistryClient;
use infer_telemetry::Telemetry;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ModelManager>,
    pub prediction_cache: Arc<PredictionCache>,
    pub pipeline: Arc<Pipeline>,
    pub registry: Arc<dyn RegistryClient>,
    pub telemetry: Arc<Telemetry>,
    /// Bounded admission control: a request that can't acquire a permit is
    /// rejected rather than queued unboundedly.
    pub request_semaphore: Arc<Semaphore>,
    pub request_timeout: Duration,
    /// Whether any preload entries were configured. `/ready` treats an
    /// empty model table as healthy when this is `false` — there was
    /// never anything to wait for.
    pub preload_configured: bool,
}
