//! Registry client: version listing, alias resolution and artifact fetch.
//!
//! The core depends only on the `RegistryClient` trait in this crate —
//! never on `HttpRegistryClient` directly — so a different registry
//! backend is a drop-in implementation, not a core change.

pub mod client;
pub mod retry;

pub use client::{ArtifactPayload, HttpRegistryClient, MockRegistryClient, RegistryClient, VersionInfo};
pub use retry::{RetryConfig, RetryPolicy};
