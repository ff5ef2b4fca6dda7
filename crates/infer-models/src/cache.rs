//! Prediction cache: `FingerprintKey -> CacheEntry`, TTL + capacity bounded
//! with LRU-style eviction via moka. Invalidated wholesale per model name
//! on a hot swap so stale predictions from a retired version never serve a
//! cache hit.

use std::time::Duration;

use infer_kernel::FingerprintKey;
use moka::sync::Cache;

/// Both the point prediction and (if computed) the probability are stored
/// together — the open question on whether `return_probabilities` belongs
/// in the key is resolved as "no", so a single entry serves both kinds of
/// request.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub prediction: f64,
    pub proba: Option<f64>,
}

pub struct PredictionCacheConfig {
    pub capacity: u64,
    pub ttl: Duration,
}

impl Default for PredictionCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

pub struct PredictionCache {
    cache: Cache<FingerprintKey, CacheEntry>,
}

impl PredictionCache {
    pub fn new(config: PredictionCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .support_invalidation_closures()
            .build();
        Self { cache }
    }

    pub fn get(&self, key: &FingerprintKey) -> Option<CacheEntry> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: FingerprintKey, entry: CacheEntry) {
        self.cache.insert(key, entry);
    }

    /// Drop every cached entry for `model_name`, across all versions —
    /// called after a hot swap so the next request for the new version
    /// always misses and recomputes.
    pub fn invalidate_model(&self, model_name: &str) {
        let model_name = model_name.to_string();
        self.cache
            .invalidate_entries_if(move |k, _| k.model_name == model_name)
            .expect("cache was built with support_invalidation_closures()");
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(model: &str, version: u64, digest: u64) -> FingerprintKey {
        FingerprintKey {
            model_name: model.to_string(),
            version,
            digest,
        }
    }

    #[test]
    fn get_after_insert_is_a_hit() {
        let cache = PredictionCache::new(PredictionCacheConfig::default());
        let k = key("m", 1, 42);
        cache.insert(
            k.clone(),
            CacheEntry {
                prediction: 0.9,
                proba: Some(0.9),
            },
        );
        let entry = cache.get(&k).unwrap();
        assert_eq!(entry.prediction, 0.9);
    }

    #[test]
    fn invalidate_model_removes_all_its_versions() {
        let cache = PredictionCache::new(PredictionCacheConfig::default());
        cache.insert(
            key("fraud_detector", 1, 1),
            CacheEntry {
                prediction: 1.0,
                proba: None,
            },
        );
        cache.insert(
            key("fraud_detector", 2, 2),
            CacheEntry {
                prediction: 2.0,
                proba: None,
            },
        );
        cache.insert(
            key("other_model", 1, 3),
            CacheEntry {
                prediction: 3.0,
                proba: None,
            },
        );
        cache.invalidate_model("fraud_detector");
        cache.run_pending_tasks();

        assert!(cache.get(&key("fraud_detector", 1, 1)).is_none());
        assert!(cache.get(&key("fraud_detector", 2, 2)).is_none());
        assert!(cache.get(&key("other_model", 1, 3)).is_some());
    }
}
