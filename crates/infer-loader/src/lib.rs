//! Artifact decoding and the closed predictor sum type.

pub mod codec;
pub mod loader;
pub mod predictors;

pub use loader::{build_predictor, load_handle};
pub use predictors::{BoostedEnsemblePredictor, LinearPredictor, Stump, TreeEnsemblePredictor};
