//! Maximal Marginal Relevance re-ranking.
//!
//! `MMR(c) = λ·sim(c, q) − (1 − λ)·max_{s ∈ selected} sim(c, s)`
//!
//! Similarities are cosine over L2-normalised embeddings, matching the
//! index's distance metric.

use docuchat_core::similarity::{dot, normalized};
use docuchat_core::types::{CandidateSet, Chunk};

#[derive(Debug, Clone, Copy, Default)]
pub struct MmrReranker;

impl MmrReranker {
    pub fn new() -> Self { Self }

    /// Returns `min(k, |candidates|)` chunks with no duplicate ids.
    ///
    /// Ties on the MMR score go to the higher query similarity, then to the
    /// earlier candidate.
    pub fn rerank(&self, candidates: CandidateSet, query: &[f32], k: usize, lambda: f32) -> Vec<Chunk> {
        if candidates.len() <= k {
            return candidates.into_vec().into_iter().map(|c| c.chunk).collect();
        }

        let chunks: Vec<Chunk> = candidates.into_vec().into_iter().map(|c| c.chunk).collect();
        let unit: Vec<Vec<f32>> = chunks.iter().map(|c| normalized(&c.embedding)).collect();
        let q = normalized(query);
        let relevance: Vec<f32> = unit.iter().map(|e| similarity(e, &q)).collect();

        // max similarity to anything already selected, per candidate
        let mut redundancy = vec![f32::NEG_INFINITY; chunks.len()];
        let mut remaining: Vec<usize> = (0..chunks.len()).collect();
        let mut order: Vec<usize> = Vec::with_capacity(k);

        while order.len() < k && !remaining.is_empty() {
            let mut best_pos = 0;
            let mut best = (f32::NEG_INFINITY, f32::NEG_INFINITY);
            for (pos, &i) in remaining.iter().enumerate() {
                let penalty = if order.is_empty() { 0.0 } else { redundancy[i] };
                let score = lambda * relevance[i] - (1.0 - lambda) * penalty;
                // strict comparisons keep the earliest candidate on full ties
                if score > best.0 || (score == best.0 && relevance[i] > best.1) {
                    best = (score, relevance[i]);
                    best_pos = pos;
                }
            }
            let picked = remaining.remove(best_pos);
            order.push(picked);
            for &i in &remaining {
                let s = similarity(&unit[i], &unit[picked]);
                if s > redundancy[i] { redundancy[i] = s; }
            }
        }

        let mut slots: Vec<Option<Chunk>> = chunks.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }
}

fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() { return 0.0; }
    dot(a, b).clamp(-1.0, 1.0)
}
