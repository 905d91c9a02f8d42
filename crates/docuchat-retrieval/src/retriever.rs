use futures::future::try_join_all;
use std::collections::HashMap;
use std::time::Duration;

use docuchat_core::error::{Provider, Result};
use docuchat_core::traits::VectorIndex;
use docuchat_core::types::{Candidate, CandidateSet, ChunkId, HydeHypothesis, IndexHit};

use crate::guard::bounded;

/// Runs one k-NN lookup per hypothesis and merges the answers.
///
/// A chunk found under several hypotheses keeps its best score. Index
/// failures are returned as-is; retrying is the caller's decision.
pub struct Retriever<'a> {
    index: &'a dyn VectorIndex,
    timeout: Duration,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a dyn VectorIndex, timeout: Duration) -> Self { Self { index, timeout } }

    pub async fn retrieve(&self, hypotheses: &[HydeHypothesis], k: usize, similarity_threshold: f32) -> Result<CandidateSet> {
        if hypotheses.is_empty() || k == 0 { return Ok(CandidateSet::new()); }

        // lookups are independent; merge order does not affect the result
        let lookups = hypotheses
            .iter()
            .map(|h| bounded(Provider::Index, self.timeout, self.index.top_k(&h.embedding, k, Some(similarity_threshold))));
        let per_hypothesis = try_join_all(lookups).await?;

        let hits = merge_hits(per_hypothesis, similarity_threshold);
        if hits.is_empty() {
            tracing::debug!(hypotheses = hypotheses.len(), threshold = similarity_threshold, "no hits above threshold");
            return Ok(CandidateSet::new());
        }

        let ids: Vec<ChunkId> = hits.iter().map(|h| h.id.clone()).collect();
        let chunks = bounded(Provider::Index, self.timeout, self.index.fetch(&ids)).await?;
        let mut by_id: HashMap<ChunkId, _> = chunks.into_iter().map(|c| (c.id.clone(), c)).collect();

        let candidates: Vec<Candidate> = hits
            .into_iter()
            .filter_map(|hit| match by_id.remove(&hit.id) {
                Some(chunk) => Some(Candidate { chunk, score: hit.score }),
                None => {
                    tracing::debug!(id = %hit.id, "hit vanished from index before fetch");
                    None
                }
            })
            .collect();
        let set = CandidateSet::from_candidates(candidates);
        tracing::debug!(hypotheses = hypotheses.len(), candidates = set.len(), top = ?set.max_score(), "retrieved");
        Ok(set)
    }
}

/// Union of hit lists with max-score dedup, below-threshold hits dropped.
///
/// Output is in first-seen order: hypotheses in input order, each list in
/// the index's rank order. The stable score sort downstream keeps that
/// order for equal scores, so ties resolve by first appearance.
fn merge_hits(per_hypothesis: Vec<Vec<IndexHit>>, threshold: f32) -> Vec<IndexHit> {
    let mut merged: Vec<IndexHit> = Vec::new();
    let mut positions: HashMap<ChunkId, usize> = HashMap::new();
    for hit in per_hypothesis.into_iter().flatten() {
        if hit.score.is_nan() || hit.score < threshold { continue; }
        match positions.get(&hit.id) {
            Some(&pos) => {
                if hit.score > merged[pos].score { merged[pos].score = hit.score; }
            }
            None => {
                positions.insert(hit.id.clone(), merged.len());
                merged.push(hit);
            }
        }
    }
    merged
}
