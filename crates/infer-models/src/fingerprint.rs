//! Canonical fingerprinting for the prediction cache key.
//!
//! Two requests that are logically identical must normalize to the same
//! `FingerprintKey` regardless of field insertion order, trailing float
//! precision, or whether the caller also asked for `predict_proba` — the
//! cache stores both forms under the same key (open question resolved:
//! `return_probabilities` is not part of the key).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use infer_kernel::{FeatureValue, FingerprintKey, Version};

/// Significant digits applied to floating-point feature values before
/// hashing, so `1.0` and `1.0000000001` fingerprint identically, and so
/// values differing only far below their own magnitude (`123.4567891` vs
/// `123.4567895`) still collide while values differing in their leading
/// digits (`0.00000012345` vs `0.00000012346`) do not.
const FLOAT_SIGNIFICANT_DIGITS: usize = 6;

/// Round `v` to `FLOAT_SIGNIFICANT_DIGITS` significant digits and render it
/// in a normalized scientific form, so magnitude is part of the comparison
/// rather than a fixed number of decimal places.
fn normalized_float(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{:e}", v);
    }
    // `{:.*e}` on the mantissa gives us N digits after the point, i.e.
    // N+1 significant digits; ask for one fewer to land on exactly
    // `FLOAT_SIGNIFICANT_DIGITS`.
    format!("{:.*e}", FLOAT_SIGNIFICANT_DIGITS - 1, v)
}

fn normalized_value(value: &FeatureValue) -> String {
    match value {
        FeatureValue::F64(v) => format!("f:{}", normalized_float(*v)),
        FeatureValue::I64(v) => format!("i:{v}"),
        FeatureValue::Bool(v) => format!("b:{}", if *v { 1 } else { 0 }),
        FeatureValue::Categorical(v) => format!("c:{v}"),
    }
}

/// Compute the cache key for `(model_name, version, features)`. Field
/// order in `features` never affects the result — entries are sorted by
/// name before hashing.
pub fn compute_fingerprint(
    model_name: &str,
    version: Version,
    features: &HashMap<String, FeatureValue>,
) -> FingerprintKey {
    let mut entries: Vec<(&String, &FeatureValue)> = features.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = DefaultHasher::new();
    model_name.hash(&mut hasher);
    version.hash(&mut hasher);
    for (name, value) in entries {
        name.hash(&mut hasher);
        normalized_value(value).hash(&mut hasher);
    }

    FingerprintKey {
        model_name: model_name.to_string(),
        version,
        digest: hasher.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_independent() {
        let mut a = HashMap::new();
        a.insert("amount".to_string(), FeatureValue::F64(150.0));
        a.insert("is_weekend".to_string(), FeatureValue::Bool(true));

        let mut b = HashMap::new();
        b.insert("is_weekend".to_string(), FeatureValue::Bool(true));
        b.insert("amount".to_string(), FeatureValue::F64(150.0));

        assert_eq!(
            compute_fingerprint("fraud_detector", 1, &a),
            compute_fingerprint("fraud_detector", 1, &b)
        );
    }

    #[test]
    fn fingerprint_ignores_float_noise_past_precision() {
        let mut a = HashMap::new();
        a.insert("amount".to_string(), FeatureValue::F64(150.0));
        let mut b = HashMap::new();
        b.insert("amount".to_string(), FeatureValue::F64(150.0000000001));

        assert_eq!(
            compute_fingerprint("m", 1, &a),
            compute_fingerprint("m", 1, &b)
        );
    }

    #[test]
    fn fingerprint_uses_significant_digits_not_fixed_decimals() {
        // Differ only far below their own magnitude: within 6 significant
        // digits of each other, so they must collide.
        let mut a = HashMap::new();
        a.insert("amount".to_string(), FeatureValue::F64(123.4567891));
        let mut b = HashMap::new();
        b.insert("amount".to_string(), FeatureValue::F64(123.4567895));
        assert_eq!(
            compute_fingerprint("m", 1, &a),
            compute_fingerprint("m", 1, &b)
        );

        // Small values must keep their leading digits instead of being
        // crushed to zero by a fixed-decimal-places scheme.
        let mut c = HashMap::new();
        c.insert("amount".to_string(), FeatureValue::F64(0.00000012345));
        let mut d = HashMap::new();
        d.insert("amount".to_string(), FeatureValue::F64(0.00000022345));
        assert_ne!(
            compute_fingerprint("m", 1, &c),
            compute_fingerprint("m", 1, &d)
        );

        // Values on either side of a power-of-ten boundary still compare by
        // their own significant digits, not a fixed decimal-place count.
        let mut e = HashMap::new();
        e.insert("amount".to_string(), FeatureValue::F64(9.5));
        let mut f = HashMap::new();
        f.insert("amount".to_string(), FeatureValue::F64(10.5));
        assert_ne!(
            compute_fingerprint("m", 1, &e),
            compute_fingerprint("m", 1, &f)
        );
    }

    #[test]
    fn fingerprint_differs_on_version() {
        let features = HashMap::new();
        assert_ne!(
            compute_fingerprint("m", 1, &features),
            compute_fingerprint("m", 2, &features)
        );
    }

    #[test]
    fn fingerprint_differs_on_value() {
        let mut a = HashMap::new();
        a.insert("amount".to_string(), FeatureValue::F64(1.0));
        let mut b = HashMap::new();
        b.insert("amount".to_string(), FeatureValue::F64(2.0));
        assert_ne!(compute_fingerprint("m", 1, &a), compute_fingerprint("m", 1, &b));
    }
}
