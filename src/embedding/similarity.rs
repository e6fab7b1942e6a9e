// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector and keyword-set similarity measures.

use std::collections::HashSet;

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ, a vector is empty, or either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0)
}

/// Jaccard overlap of two keyword sets. Two empty sets score 0.0.
pub fn jaccard_similarity<S: AsRef<str>>(a: &[S], b: &[S]) -> f32 {
    let set_a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let set_b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();

    intersection as f32 / union as f32
}

/// Scales a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
