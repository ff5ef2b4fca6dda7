//! Tier-2: a durable tabular store queryable by primary key. The feature
//! store client never talks to tier-2 directly from request handlers — only
//! through this trait, so the real deployment's store is swappable.

use async_trait::async_trait;
use infer_kernel::{FeatureKey, FeatureRow, PipelineError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn get(&self, key: &FeatureKey) -> Result<Option<FeatureRow>, PipelineError>;
    async fn put(&self, row: FeatureRow) -> Result<(), PipelineError>;
}

/// Reference tier-2 implementation for tests and local development. The
/// durable store itself is an external collaborator in production.
#[derive(Default)]
pub struct InMemoryTabularStore {
    rows: Mutex<HashMap<FeatureKey, FeatureRow>>,
}

impl InMemoryTabularStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn get(&self, key: &FeatureKey) -> Result<Option<FeatureRow>, PipelineError> {
        Ok(self.rows.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, row: FeatureRow) -> Result<(), PipelineError> {
        self.rows.lock().unwrap().insert(row.key.clone(), row);
        Ok(())
    }
}

/// Convenience for seeding a row from a value map in tests.
pub fn row_for(
    key: FeatureKey,
    values: HashMap<String, infer_kernel::FeatureValue>,
    version: u64,
) -> FeatureRow {
    FeatureRow {
        key,
        values,
        version,
        fetched_at: Instant::now(),
    }
}
