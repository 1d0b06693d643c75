//! Vector similarity

use crate::domain::CacheError;

/// Cosine similarity between two vectors of equal length.
///
/// Returns a value in `[-1.0, 1.0]`. Empty vectors and zero-magnitude vectors
/// score `0.0`; vectors of different lengths are rejected rather than padded.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, CacheError> {
    if a.is_empty() || b.is_empty() {
        return Ok(0.0);
    }

    if a.len() != b.len() {
        return Err(CacheError::invalid_argument(format!(
            "Vector dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    // Accumulate in f64 so that cosine(v, v) lands exactly on 1.0
    let (dot, norm_a_sq, norm_b_sq) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a_sq * norm_b_sq).sqrt();

    Ok(similarity.clamp(-1.0, 1.0) as f32)
}
