//! Two-tier feature store client: a volatile tier-1 cache in front of a
//! durable tier-2 tabular store. Nothing outside this crate talks to
//! either tier directly.

pub mod client;
pub mod store;

pub use client::{FeatureStoreClient, FeatureStoreConfig};
pub use store::{row_for, InMemoryTabularStore, TabularStore};
