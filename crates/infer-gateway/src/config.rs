//! Environment-driven configuration. No file-format parsing — every field
//! is read from an env var with a documented default, in the style of the
//! gateway this crate descends from.

use std::time::Duration;

use infer_kernel::PipelineError;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub poller_interval_seconds: u64,
    pub poller_jitter_fraction: f64,
    pub prediction_cache_capacity: u64,
    pub prediction_cache_ttl_seconds: u64,
    pub feature_cache_capacity: u64,
    pub feature_cache_ttl_seconds: u64,
    pub model_drain_window_seconds: u64,
    pub request_timeout_ms: u64,
    pub preload_models: Vec<(String, String)>,
    pub request_queue_capacity: usize,
    pub shutdown_deadline_seconds: u64,
    pub registry_base_url: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        let listen_addr = std::env::var("INFERD_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let poller_interval_seconds = env_parse("INFERD_POLLER_INTERVAL_SECONDS", 60u64).max(5);
        let poller_jitter_fraction = env_parse("INFERD_POLLER_JITTER_FRACTION", 0.1f64);
        if !(0.0..1.0).contains(&poller_jitter_fraction) {
            return Err(PipelineError::Config(
                "INFERD_POLLER_JITTER_FRACTION must be in [0, 1)".to_string(),
            ));
        }

        let prediction_cache_capacity = env_parse("INFERD_PREDICTION_CACHE_CAPACITY", 10_000u64);
        let prediction_cache_ttl_seconds = env_parse("INFERD_PREDICTION_CACHE_TTL_SECONDS", 300u64);
        let feature_cache_capacity = env_parse("INFERD_FEATURE_CACHE_CAPACITY", 100_000u64);
        let feature_cache_ttl_seconds = env_parse("INFERD_FEATURE_CACHE_TTL_SECONDS", 3600u64);
        let model_drain_window_seconds = env_parse("INFERD_MODEL_DRAIN_WINDOW_SECONDS", 30u64);
        let request_timeout_ms = env_parse("INFERD_REQUEST_TIMEOUT_MS", 2_000u64);
        let request_queue_capacity = env_parse("INFERD_REQUEST_QUEUE_CAPACITY", 1_024usize);
        let shutdown_deadline_seconds = env_parse("INFERD_SHUTDOWN_DEADLINE_SECONDS", 30u64);
        let registry_base_url =
            std::env::var("INFERD_REGISTRY_URL").unwrap_or_else(|_| "http://localhost:9090".to_string());

        let preload_models = std::env::var("INFERD_PRELOAD_MODELS")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_preload_entry(s.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            listen_addr,
            poller_interval_seconds,
            poller_jitter_fraction,
            prediction_cache_capacity,
            prediction_cache_ttl_seconds,
            feature_cache_capacity,
            feature_cache_ttl_seconds,
            model_drain_window_seconds,
            request_timeout_ms,
            preload_models,
            request_queue_capacity,
            shutdown_deadline_seconds,
            registry_base_url,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poller_interval(&self) -> Duration {
        Duration::from_secs(self.poller_interval_seconds)
    }

    pub fn prediction_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.prediction_cache_ttl_seconds)
    }

    pub fn feature_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feature_cache_ttl_seconds)
    }

    pub fn model_drain_window(&self) -> Duration {
        Duration::from_secs(self.model_drain_window_seconds)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_seconds)
    }
}

fn parse_preload_entry(entry: &str) -> Result<(String, String), PipelineError> {
    let (name, selector) = entry.split_once(':').ok_or_else(|| {
        PipelineError::Config(format!(
            "invalid INFERD_PRELOAD_MODELS entry '{entry}', expected name:(version|alias)"
        ))
    })?;
    if name.trim().is_empty() || selector.trim().is_empty() {
        return Err(PipelineError::Config(format!(
            "invalid INFERD_PRELOAD_MODELS entry '{entry}'"
        )));
    }
    Ok((name.trim().to_string(), selector.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_preload_entry_splits_name_and_selector() {
        let (name, selector) = parse_preload_entry("fraud_detector:production").unwrap();
        assert_eq!(name, "fraud_detector");
        assert_eq!(selector, "production");
    }

    #[test]
    fn parse_preload_entry_rejects_missing_colon() {
        assert!(parse_preload_entry("fraud_detector").is_err());
    }

    #[test]
    fn defaults_apply_without_env_overrides() {
        // Bare reads of env_parse with keys unlikely to be set; documents
        // the default contract without needing an isolated process env.
        let v: u64 = env_parse("INFERD_TEST_UNSET_KEY_FOR_DEFAULTS", 42);
        assert_eq!(v, 42);
    }
}
