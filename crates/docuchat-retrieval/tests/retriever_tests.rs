mod common;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use common::{chunk, hit, ScriptedIndex, Step};
use docuchat_core::error::Provider;
use docuchat_core::traits::VectorIndex;
use docuchat_core::types::{CandidateSet, HydeHypothesis, HypothesisOrigin};
use docuchat_retrieval::Retriever;
use docuchat_vector::InMemoryIndex;

const TIMEOUT: Duration = Duration::from_secs(2);

fn hypothesis(embedding: Vec<f32>) -> HydeHypothesis {
    HydeHypothesis { text: "h".into(), embedding, origin: HypothesisOrigin::Generated }
}

fn as_map(set: &CandidateSet) -> BTreeMap<String, f32> {
    set.iter().map(|c| (c.chunk.id.clone(), c.score)).collect()
}

fn three_chunks() -> Vec<docuchat_core::types::Chunk> {
    vec![
        chunk("a", "alpha", vec![1.0, 0.0, 0.0, 0.0]),
        chunk("b", "beta", vec![0.0, 1.0, 0.0, 0.0]),
        chunk("c", "gamma", vec![0.0, 0.0, 1.0, 0.0]),
    ]
}

#[tokio::test]
async fn threshold_filters_weak_hits() {
    let index = ScriptedIndex::new(three_chunks()).then(Step::Hits(vec![hit("a", 0.9), hit("b", 0.6), hit("c", 0.4)]));
    let retriever = Retriever::new(&index, TIMEOUT);

    let set = retriever.retrieve(&[hypothesis(vec![1.0, 0.0, 0.0, 0.0])], 10, 0.5).await.expect("retrieve");
    let ids: Vec<_> = set.iter().map(|c| c.chunk.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(set.max_score(), Some(0.9));
}

#[tokio::test]
async fn duplicate_hits_keep_their_best_score() {
    let index = ScriptedIndex::new(three_chunks())
        .then(Step::Hits(vec![hit("a", 0.6), hit("b", 0.55)]))
        .then(Step::Hits(vec![hit("b", 0.8), hit("a", 0.5)]));
    let retriever = Retriever::new(&index, TIMEOUT);

    let hyps = [hypothesis(vec![1.0, 0.0, 0.0, 0.0]), hypothesis(vec![0.0, 1.0, 0.0, 0.0])];
    let set = retriever.retrieve(&hyps, 10, 0.0).await.expect("retrieve");
    assert_eq!(set.len(), 2);
    assert_eq!(set.as_slice()[0].chunk.id, "b");
    assert_eq!(set.get("b").map(|c| c.score), Some(0.8));
    assert_eq!(set.get("a").map(|c| c.score), Some(0.6));
}

#[tokio::test]
async fn equal_scores_keep_index_order() {
    let index = ScriptedIndex::new(three_chunks()).then(Step::Hits(vec![hit("c", 0.7), hit("a", 0.7), hit("b", 0.7)]));
    let retriever = Retriever::new(&index, TIMEOUT);

    let set = retriever.retrieve(&[hypothesis(vec![1.0, 0.0, 0.0, 0.0])], 10, 0.0).await.expect("retrieve");
    let ids: Vec<_> = set.iter().map(|c| c.chunk.id.as_str()).collect();
    assert_eq!(ids, ["c", "a", "b"]);
}

#[tokio::test]
async fn merge_does_not_depend_on_hypothesis_order() {
    let index = InMemoryIndex::new();
    index
        .insert(&[
            chunk("n", "north", vec![1.0, 0.1, 0.0, 0.0]),
            chunk("e", "east", vec![0.1, 1.0, 0.0, 0.0]),
            chunk("ne", "north east", vec![1.0, 1.0, 0.0, 0.0]),
            chunk("up", "up", vec![0.0, 0.0, 1.0, 0.0]),
        ])
        .await
        .expect("insert");
    let retriever = Retriever::new(&index, TIMEOUT);
    let a = hypothesis(vec![1.0, 0.0, 0.0, 0.0]);
    let b = hypothesis(vec![0.0, 1.0, 0.0, 0.0]);

    let ab = retriever.retrieve(&[a.clone(), b.clone()], 3, 0.2).await.expect("ab");
    let ba = retriever.retrieve(&[b, a], 3, 0.2).await.expect("ba");
    assert_eq!(as_map(&ab), as_map(&ba));
    assert!(!ab.contains("up"));
}

#[tokio::test]
async fn chunks_missing_from_the_store_are_skipped() {
    let index = ScriptedIndex::new(three_chunks()).then(Step::Hits(vec![hit("ghost", 0.95), hit("a", 0.9)]));
    let retriever = Retriever::new(&index, TIMEOUT);

    let set = retriever.retrieve(&[hypothesis(vec![1.0, 0.0, 0.0, 0.0])], 10, 0.0).await.expect("retrieve");
    assert_eq!(set.len(), 1);
    assert!(set.contains("a"));
}

#[tokio::test]
async fn no_hypotheses_means_no_lookups() {
    let index = ScriptedIndex::new(three_chunks()).then(Step::Fail);
    let retriever = Retriever::new(&index, TIMEOUT);
    assert!(retriever.retrieve(&[], 10, 0.0).await.expect("retrieve").is_empty());
    assert_eq!(index.searches(), 0);
}

#[tokio::test]
async fn unreachable_index_is_reported_not_retried() {
    let index = ScriptedIndex::new(three_chunks()).then(Step::Fail);
    let retriever = Retriever::new(&index, TIMEOUT);

    let err = retriever.retrieve(&[hypothesis(vec![1.0, 0.0, 0.0, 0.0])], 10, 0.0).await.expect_err("index down");
    assert_eq!(err.provider(), Some(Provider::Index));
    assert_eq!(index.searches(), 1);
}

#[tokio::test]
async fn slow_index_times_out() {
    let index = ScriptedIndex::new(three_chunks()).then(Step::Stall(Duration::from_millis(500)));
    let retriever = Retriever::new(&index, Duration::from_millis(20));

    let err = retriever.retrieve(&[hypothesis(vec![1.0, 0.0, 0.0, 0.0])], 10, 0.0).await.expect_err("timeout");
    assert_eq!(err.provider(), Some(Provider::Index));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn hypothesis_lookups_run_concurrently() {
    let delay = Duration::from_millis(300);
    let index = ScriptedIndex::new(three_chunks()).then(Step::Slow(delay, vec![hit("a", 0.9), hit("b", 0.6)]));
    let retriever = Retriever::new(&index, TIMEOUT);
    let hyps = [hypothesis(vec![1.0, 0.0, 0.0, 0.0]), hypothesis(vec![0.0, 1.0, 0.0, 0.0])];

    let started = Instant::now();
    let set = retriever.retrieve(&hyps, 10, 0.0).await.expect("retrieve");
    let elapsed = started.elapsed();

    assert_eq!(index.searches(), 2);
    assert!(elapsed < delay * 2 - Duration::from_millis(100), "lookups ran one after another: {elapsed:?}");
    let ids: Vec<_> = set.iter().map(|c| c.chunk.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(set.get("a").map(|c| c.score), Some(0.9));
}
