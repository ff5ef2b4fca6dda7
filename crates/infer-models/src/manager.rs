//! Model Manager: the atomic `name -> ModelHandle` table.
//!
//! A swap is a single pointer publish via `ArcSwap` — readers never see a
//! handle whose schema and predictor disagree on arity, and a retired
//! handle stays alive in the drain set for any reader that grabbed it just
//! before the swap. At most one load per `(name, version)` runs at a time,
//! enforced by a per-name token held for the duration of the load.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use infer_kernel::{ModelHandle, PipelineError, Stage, Version};
use infer_loader::load_handle;
use infer_registry::RegistryClient;
use infer_telemetry::Telemetry;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

struct DrainEntry {
    handle: Arc<ModelHandle>,
    deadline: Instant,
}

pub struct ModelManagerConfig {
    pub drain_window: Duration,
}

impl Default for ModelManagerConfig {
    fn default() -> Self {
        Self {
            drain_window: Duration::from_secs(30),
        }
    }
}

/// Holds the live handle table, the per-name load-serialization tokens, and
/// the set of recently-retired handles awaiting their drain deadline.
pub struct ModelManager {
    handles: DashMap<String, ArcSwap<ModelHandle>>,
    load_tokens: DashMap<String, Arc<AsyncMutex<()>>>,
    draining: DashMap<(String, Version), DrainEntry>,
    config: ModelManagerConfig,
    telemetry: Arc<Telemetry>,
}

impl ModelManager {
    pub fn new(config: ModelManagerConfig, telemetry: Arc<Telemetry>) -> Self {
        Self {
            handles: DashMap::new(),
            load_tokens: DashMap::new(),
            draining: DashMap::new(),
            config,
            telemetry,
        }
    }

    /// The handle currently serving traffic for `name`, if any has loaded.
    pub fn current(&self, name: &str) -> Option<Arc<ModelHandle>> {
        self.handles.get(name).map(|h| h.load_full())
    }

    pub fn loaded_models(&self) -> Vec<Arc<ModelHandle>> {
        self.handles.iter().map(|h| h.load_full()).collect()
    }

    /// Resolve a specific `(name, version)`, checking the live handle first
    /// and falling back to the drain set — a request that grabbed a handle
    /// just before a swap can still complete against the retired version.
    pub fn handle_for_version(&self, name: &str, version: Version) -> Option<Arc<ModelHandle>> {
        if let Some(current) = self.current(name) {
            if current.version == version {
                return Some(current);
            }
        }
        self.draining
            .get(&(name.to_string(), version))
            .map(|e| e.handle.clone())
    }

    fn token_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        self.load_tokens
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Fetch, build, validate and publish `(name, version)`. Serialized per
    /// name: a concurrent call for the same name waits for the in-flight
    /// one rather than racing it. On failure the existing handle (if any)
    /// is left untouched — a `LoadError` is non-fatal to the process.
    pub async fn submit_load(
        &self,
        registry: &dyn RegistryClient,
        name: &str,
        version: Version,
        stage: Stage,
    ) -> Result<Arc<ModelHandle>, PipelineError> {
        let token = self.token_for(name);
        let _guard = token.lock().await;

        if let Some(current) = self.current(name) {
            if current.version == version {
                return Ok(current);
            }
        }

        let start = Instant::now();
        let loaded = self.try_load(registry, name, version, stage).await;
        let elapsed = start.elapsed().as_secs_f64();

        match &loaded {
            Ok(_) => self.telemetry.record_model_load(name, version, "success", elapsed),
            Err(_) => self.telemetry.record_model_load(name, version, "failure", elapsed),
        }

        loaded
    }

    async fn try_load(
        &self,
        registry: &dyn RegistryClient,
        name: &str,
        version: Version,
        stage: Stage,
    ) -> Result<Arc<ModelHandle>, PipelineError> {
        let payload = registry.fetch_artifact(name, version).await?;
        let handle = load_handle(name, version, stage, payload)?;
        let new_handle = Arc::new(handle);

        let previous = match self.handles.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                Some(existing.get().swap(new_handle.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ArcSwap::from(new_handle.clone()));
                None
            }
        };

        if let Some(previous) = previous {
            info!(
                model_name = name,
                retired_version = previous.version,
                new_version = version,
                "model handle swapped, retired version entering drain window"
            );
            self.draining.insert(
                (name.to_string(), previous.version),
                DrainEntry {
                    handle: previous,
                    deadline: Instant::now() + self.config.drain_window,
                },
            );
        } else {
            info!(model_name = name, version, "model handle published for the first time");
        }

        Ok(new_handle)
    }

    /// Resolve each `name:(version|alias)` preload entry against the
    /// registry and load it. Individual failures are logged and do not
    /// abort the remaining preload list.
    pub async fn preload(
        &self,
        registry: &dyn RegistryClient,
        entries: &[(String, String)],
    ) {
        for (name, selector) in entries {
            let resolved = if let Ok(v) = selector.parse::<u64>() {
                Ok(Some(v))
            } else {
                registry.resolve_alias(name, selector).await
            };
            match resolved {
                Ok(Some(version)) => {
                    if let Err(e) = self.submit_load(registry, name, version, Stage::Production).await {
                        warn!(model_name = name, error = %e, "preload failed");
                    }
                }
                Ok(None) => {
                    warn!(model_name = name, selector, "preload alias did not resolve to a version");
                }
                Err(e) => {
                    warn!(model_name = name, error = %e, "preload alias resolution failed");
                }
            }
        }
    }

    /// Drop drain-set entries whose deadline has passed. Called from the
    /// poller's background loop on every tick.
    pub fn sweep_drain(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(String, Version)> = self
            .draining
            .iter()
            .filter(|e| e.deadline <= now)
            .map(|e| e.key().clone())
            .collect();
        let count = expired.len();
        for key in expired {
            self.draining.remove(&key);
        }
        count
    }

    pub fn draining_count(&self) -> usize {
        self.draining.len()
    }

    /// A snapshot used by the `/models` endpoint.
    pub fn summary(&self) -> HashMap<String, (Version, Stage, Instant)> {
        let mut out = HashMap::new();
        for entry in self.handles.iter() {
            let handle = entry.value().load_full();
            match out.entry(entry.key().clone()) {
                Entry::Vacant(slot) => {
                    slot.insert((handle.version, handle.stage, handle.loaded_at));
                }
                Entry::Occupied(_) => {}
            }
        }
        out
    }
}
