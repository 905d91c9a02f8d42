//! Vector math shared by the in-memory index and the MMR reranker.
//!
//! Embeddings are not assumed to be unit length; callers normalise before
//! comparing so scores match a cosine-distance index.

pub fn magnitude(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

/// L2-normalised copy of `v`. A zero vector stays zero.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = magnitude(v);
    if norm <= f32::EPSILON { return vec![0.0; v.len()]; }
    v.iter().map(|x| x / norm).collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// Cosine similarity in [-1, 1]; 0 when either side is a zero vector or
/// the dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() { return 0.0; }
    let denom = magnitude(a) * magnitude(b);
    if denom <= f32::EPSILON { return 0.0; }
    (dot(a, b) / denom).clamp(-1.0, 1.0)
}
