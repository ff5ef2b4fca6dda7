//! `InputSchema` — the ordered, typed contract a `ModelHandle` validates
//! requests against and assembles feature vectors from.
//!
//! Schema-driven assembly replaces the "dynamic feature dict" pattern the
//! source system used: field order, type, defaults and transforms are all
//! declared data, not discovered by inspecting whatever keys a request
//! happened to send.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PipelineError;

/// The scalar types a feature field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dtype {
    F64,
    I64,
    Bool,
    Categorical,
}

/// A named, typed feature value as it flows through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    F64(f64),
    I64(i64),
    Bool(bool),
    Categorical(String),
}

impl FeatureValue {
    pub fn dtype(&self) -> Dtype {
        match self {
            FeatureValue::F64(_) => Dtype::F64,
            FeatureValue::I64(_) => Dtype::I64,
            FeatureValue::Bool(_) => Dtype::Bool,
            FeatureValue::Categorical(_) => Dtype::Categorical,
        }
    }

    /// Widen to `f64` for numeric transforms and vector assembly.
    /// Categorical values are not directly numeric — callers must route
    /// them through a `one_hot` transform first.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::F64(v) => Some(*v),
            FeatureValue::I64(v) => Some(*v as f64),
            FeatureValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            FeatureValue::Categorical(_) => None,
        }
    }
}

/// A named transform applied to one field when assembling the numeric
/// vector passed to the predictor. The set of transforms is part of the
/// schema, not inferred from the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// `(x - mean) / std`.
    Standardize { mean: f64, std: f64 },
    /// Clip to `[lo, hi]`.
    MinMaxClip { lo: f64, hi: f64 },
    /// Replace a missing value with a constant default.
    ImputeDefault { value: f64 },
    /// Expand a categorical field into a fixed-order one-hot block.
    OneHot { classes: Vec<String> },
}

impl Transform {
    /// Width of the numeric block this transform contributes to the
    /// assembled vector (1 for scalar transforms, `classes.len()` for
    /// one-hot).
    pub fn output_width(&self) -> usize {
        match self {
            Transform::OneHot { classes } => classes.len().max(1),
            _ => 1,
        }
    }

    /// Apply the transform, writing into `out` starting at `offset`.
    pub fn apply(&self, value: Option<&FeatureValue>, out: &mut [f64]) {
        match self {
            Transform::Standardize { mean, std } => {
                let x = value.and_then(FeatureValue::as_f64).unwrap_or(0.0);
                let std = if *std == 0.0 { 1.0 } else { *std };
                out[0] = (x - mean) / std;
            }
            Transform::MinMaxClip { lo, hi } => {
                let x = value.and_then(FeatureValue::as_f64).unwrap_or(0.0);
                out[0] = x.clamp(*lo, *hi);
            }
            Transform::ImputeDefault { value: default } => {
                out[0] = value.and_then(FeatureValue::as_f64).unwrap_or(*default);
            }
            Transform::OneHot { classes } => {
                out.iter_mut().for_each(|v| *v = 0.0);
                if let Some(FeatureValue::Categorical(c)) = value {
                    if let Some(idx) = classes.iter().position(|k| k == c) {
                        out[idx] = 1.0;
                    }
                }
            }
        }
    }
}

/// One field in an `InputSchema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub dtype: Dtype,
    pub required: bool,
    pub default: Option<FeatureValue>,
    /// Transform applied when assembling the numeric vector. `None` means
    /// the raw numeric value of the field is used as-is.
    pub transform: Option<Transform>,
}

/// Ordered, typed contract describing the features a model expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn input_arity(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.transform.as_ref().map(Transform::output_width).unwrap_or(1))
            .sum()
    }

    /// Validate and fill defaults, returning a complete feature map in
    /// schema order. Rejects unknown required fields being absent, and
    /// type mismatches.
    pub fn validate_and_fill(
        &self,
        mut features: HashMap<String, FeatureValue>,
    ) -> Result<HashMap<String, FeatureValue>, PipelineError> {
        for field in &self.fields {
            match features.get(&field.name) {
                Some(v) => {
                    if v.dtype() != field.dtype {
                        return Err(PipelineError::Validation(format!(
                            "field '{}' expected {:?}, got {:?}",
                            field.name,
                            field.dtype,
                            v.dtype()
                        )));
                    }
                }
                None => {
                    if let Some(default) = &field.default {
                        features.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        return Err(PipelineError::Validation(format!(
                            "missing required field '{}'",
                            field.name
                        )));
                    }
                }
            }
        }
        Ok(features)
    }

    /// Assemble the numeric vector a `Predictor` consumes, in schema order,
    /// applying each field's declared transform.
    pub fn assemble_vector(&self, features: &HashMap<String, FeatureValue>) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.input_arity());
        for field in &self.fields {
            let value = features.get(&field.name);
            match &field.transform {
                Some(transform) => {
                    let width = transform.output_width();
                    let start = out.len();
                    out.resize(start + width, 0.0);
                    transform.apply(value, &mut out[start..]);
                }
                None => {
                    out.push(value.and_then(FeatureValue::as_f64).unwrap_or(0.0));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> InputSchema {
        InputSchema {
            fields: vec![
                FieldSpec {
                    name: "amount".into(),
                    dtype: Dtype::F64,
                    required: true,
                    default: None,
                    transform: None,
                },
                FieldSpec {
                    name: "is_weekend".into(),
                    dtype: Dtype::Bool,
                    required: false,
                    default: Some(FeatureValue::Bool(false)),
                    transform: None,
                },
            ],
        }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let schema = schema();
        let err = schema.validate_and_fill(HashMap::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("amount")));
    }

    #[test]
    fn default_fills_missing_optional_field() {
        let schema = schema();
        let mut features = HashMap::new();
        features.insert("amount".to_string(), FeatureValue::F64(150.0));
        let filled = schema.validate_and_fill(features).unwrap();
        assert_eq!(filled.get("is_weekend"), Some(&FeatureValue::Bool(false)));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let schema = schema();
        let mut features = HashMap::new();
        features.insert("amount".to_string(), FeatureValue::Bool(true));
        let err = schema.validate_and_fill(features).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn assemble_vector_respects_schema_order() {
        let schema = schema();
        let mut features = HashMap::new();
        features.insert("amount".to_string(), FeatureValue::F64(150.0));
        features.insert("is_weekend".to_string(), FeatureValue::Bool(true));
        let v = schema.assemble_vector(&features);
        assert_eq!(v, vec![150.0, 1.0]);
    }

    #[test]
    fn one_hot_transform_expands_width() {
        let schema = InputSchema {
            fields: vec![FieldSpec {
                name: "merchant".into(),
                dtype: Dtype::Categorical,
                required: true,
                default: None,
                transform: Some(Transform::OneHot {
                    classes: vec!["a".into(), "b".into(), "c".into()],
                }),
            }],
        };
        assert_eq!(schema.input_arity(), 3);
        let mut features = HashMap::new();
        features.insert("merchant".to_string(), FeatureValue::Categorical("b".into()));
        let v = schema.assemble_vector(&features);
        assert_eq!(v, vec![0.0, 1.0, 0.0]);
    }
}
