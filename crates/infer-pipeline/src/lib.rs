//! End-to-end prediction pipeline: validate, resolve, cache, feature-fetch,
//! transform, predict.

pub mod pipeline;

pub use pipeline::Pipeline;
