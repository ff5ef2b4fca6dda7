//! The closed set of predictor implementations. No reflection, no plugin
//! registry — a new model family means a new variant here and a new match
//! arm in [`build_predictor`](crate::loader::build_predictor).

use infer_kernel::{PipelineError, Predictor, PredictorKind};

/// `y = w . x + b`.
#[derive(Debug)]
pub struct LinearPredictor {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl Predictor for LinearPredictor {
    fn kind(&self) -> PredictorKind {
        PredictorKind::Linear
    }

    fn input_arity(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, PipelineError> {
        if features.len() != self.weights.len() {
            return Err(PipelineError::Predictor(format!(
                "expected {} inputs, got {}",
                self.weights.len(),
                features.len()
            )));
        }
        let dot: f64 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.bias)
    }

    fn predict_proba(&self, _features: &[f64]) -> Result<f64, PipelineError> {
        Err(PipelineError::Predictor(
            "linear predictor does not support predict_proba".into(),
        ))
    }
}

/// A decision stump: splits on one feature index against a threshold.
#[derive(Debug, Clone)]
pub struct Stump {
    pub feature_idx: usize,
    pub threshold: f64,
    pub left_value: f64,
    pub right_value: f64,
}

impl Stump {
    fn eval(&self, features: &[f64]) -> f64 {
        let x = features.get(self.feature_idx).copied().unwrap_or(0.0);
        if x <= self.threshold {
            self.left_value
        } else {
            self.right_value
        }
    }
}

/// Unweighted average of a forest of stumps.
#[derive(Debug)]
pub struct TreeEnsemblePredictor {
    pub stumps: Vec<Stump>,
    pub input_arity: usize,
}

impl Predictor for TreeEnsemblePredictor {
    fn kind(&self) -> PredictorKind {
        PredictorKind::TreeEnsemble
    }

    fn input_arity(&self) -> usize {
        self.input_arity
    }

    fn predict(&self, features: &[f64]) -> Result<f64, PipelineError> {
        if features.len() != self.input_arity {
            return Err(PipelineError::Predictor(format!(
                "expected {} inputs, got {}",
                self.input_arity,
                features.len()
            )));
        }
        if self.stumps.is_empty() {
            return Err(PipelineError::Predictor("empty ensemble".into()));
        }
        let sum: f64 = self.stumps.iter().map(|s| s.eval(features)).sum();
        Ok(sum / self.stumps.len() as f64)
    }

    fn predict_proba(&self, _features: &[f64]) -> Result<f64, PipelineError> {
        Err(PipelineError::Predictor(
            "tree ensemble predictor does not support predict_proba".into(),
        ))
    }
}

/// Gradient-boosted stumps: weighted sum passed through a sigmoid for
/// `predict_proba`. The only variant with `supports_proba == true`.
#[derive(Debug)]
pub struct BoostedEnsemblePredictor {
    pub stumps: Vec<Stump>,
    pub learning_rate: f64,
    pub input_arity: usize,
}

impl BoostedEnsemblePredictor {
    fn raw_score(&self, features: &[f64]) -> f64 {
        self.learning_rate * self.stumps.iter().map(|s| s.eval(features)).sum::<f64>()
    }
}

impl Predictor for BoostedEnsemblePredictor {
    fn kind(&self) -> PredictorKind {
        PredictorKind::BoostedEnsemble
    }

    fn input_arity(&self) -> usize {
        self.input_arity
    }

    fn predict(&self, features: &[f64]) -> Result<f64, PipelineError> {
        if features.len() != self.input_arity {
            return Err(PipelineError::Predictor(format!(
                "expected {} inputs, got {}",
                self.input_arity,
                features.len()
            )));
        }
        Ok(self.raw_score(features))
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, PipelineError> {
        if features.len() != self.input_arity {
            return Err(PipelineError::Predictor(format!(
                "expected {} inputs, got {}",
                self.input_arity,
                features.len()
            )));
        }
        let score = self.raw_score(features);
        Ok(1.0 / (1.0 + (-score).exp()))
    }
}
