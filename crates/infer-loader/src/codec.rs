//! Deterministic binary decoder for artifact bytes.
//!
//! The remote artifact format itself is out of scope — the registry may
//! serve whatever its backing store produces. What this module owns is a
//! fixed, self-describing little-endian layout so the loader can validate
//! shape before it ever calls into a predictor: a `u32` count, followed by
//! that many `f64` values.

use infer_kernel::PipelineError;

pub fn read_f64_vec(bytes: &[u8]) -> Result<Vec<f64>, PipelineError> {
    if bytes.len() < 4 {
        return Err(PipelineError::Load("artifact truncated (missing count)".into()));
    }
    let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let expected_len = 4 + count * 8;
    if bytes.len() < expected_len {
        return Err(PipelineError::Load(format!(
            "artifact truncated: expected {expected_len} bytes for {count} values, got {}",
            bytes.len()
        )));
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let start = 4 + i * 8;
        let v = f64::from_le_bytes(bytes[start..start + 8].try_into().unwrap());
        out.push(v);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[f64]) -> Vec<u8> {
        let mut out = (values.len() as u32).to_le_bytes().to_vec();
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn roundtrips_through_encode_decode() {
        let values = vec![1.0, -2.5, 0.0, 3.25];
        let bytes = encode(&values);
        let decoded = read_f64_vec(&bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn rejects_truncated_payload() {
        let bytes = vec![5, 0, 0, 0, 1, 2, 3];
        let err = read_f64_vec(&bytes).unwrap_err();
        assert!(matches!(err, PipelineError::Load(_)));
    }
}
