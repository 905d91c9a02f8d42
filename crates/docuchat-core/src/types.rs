//! Domain types shared by the providers, the vector indexes and the
//! retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub type ChunkId = String;
pub type Meta = BTreeMap<String, MetaValue>;

/// Scalar metadata value attached to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A unit of a source document, embedded and indexed on its own.
///
/// - `id`: globally unique chunk identifier
/// - `document_id`: identity of the source document
/// - `text`: the text payload of the chunk
/// - `embedding`: vector of the index's fixed dimension
/// - `metadata`: scalar attributes produced at ingestion
///
/// Chunks are immutable once stored; the retrieval core only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Meta,
}

/// A chunk as produced by the external splitter, before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub document_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl ChunkRecord {
    pub fn into_chunk(self, embedding: Vec<f32>) -> Chunk {
        Chunk { id: self.id, document_id: self.document_id, text: self.text, embedding, metadata: self.metadata }
    }
}

/// A single k-NN answer from a vector index. Higher `score` is better.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: ChunkId,
    pub score: f32,
}

/// Where a hypothesis embedding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypothesisOrigin {
    /// Generated answer passage for the bare query.
    Generated,
    /// Generated answer passage conditioned on chunks found so far.
    ContextAware,
    /// The raw query's own embedding.
    RawQuery,
}

/// Synthetic answer passage used as a search target. Lives for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct HydeHypothesis {
    pub text: String,
    pub embedding: Vec<f32>,
    pub origin: HypothesisOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk: Chunk,
    pub score: f32,
}

/// Candidates of one retrieval attempt, deduplicated by chunk id.
///
/// Entries are kept in non-increasing score order. Ties keep the order in
/// which chunks first entered the set, so identical inputs always produce
/// identical output.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    entries: Vec<Candidate>,
    positions: HashMap<ChunkId, usize>,
}

impl CandidateSet {
    pub fn new() -> Self { Self::default() }

    /// Build a set from candidates in arrival order, keeping the best score per id.
    pub fn from_candidates<I: IntoIterator<Item = Candidate>>(candidates: I) -> Self {
        let mut set = Self::new();
        for c in candidates { set.upsert(c); }
        set.sort_by_score();
        set
    }

    /// Union with max-score dedup. Chunks already present win ties against newcomers.
    pub fn merge(&mut self, other: CandidateSet) {
        for c in other.entries { self.upsert(c); }
        self.sort_by_score();
    }

    /// Drop every candidate scoring below `threshold`.
    pub fn retain_at_least(&mut self, threshold: f32) {
        self.entries.retain(|c| c.score >= threshold);
        self.reindex();
    }

    pub fn max_score(&self) -> Option<f32> { self.entries.first().map(|c| c.score) }

    /// The best `n` candidates.
    pub fn top(&self, n: usize) -> &[Candidate] { &self.entries[..n.min(self.entries.len())] }

    pub fn get(&self, id: &str) -> Option<&Candidate> { self.positions.get(id).map(|&i| &self.entries[i]) }

    pub fn contains(&self, id: &str) -> bool { self.positions.contains_key(id) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> { self.entries.iter() }

    pub fn as_slice(&self) -> &[Candidate] { &self.entries }

    pub fn into_vec(self) -> Vec<Candidate> { self.entries }

    fn upsert(&mut self, candidate: Candidate) {
        if let Some(&pos) = self.positions.get(&candidate.chunk.id) {
            let existing = &mut self.entries[pos];
            if candidate.score > existing.score { existing.score = candidate.score; }
            return;
        }
        self.positions.insert(candidate.chunk.id.clone(), self.entries.len());
        self.entries.push(candidate);
    }

    fn sort_by_score(&mut self) {
        // stable: equal scores stay in first-seen order
        self.entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.positions.clear();
        for (i, c) in self.entries.iter().enumerate() { self.positions.insert(c.chunk.id.clone(), i); }
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;
    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

/// Final output of retrieval, handed to context assembly.
///
/// `chunks` is in diversity-adjusted order. An empty `chunks` list with
/// `confidence == 0.0` is the valid "nothing relevant" outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub confidence: f32,
    pub used_deep_search: bool,
    /// Escalation rounds performed after the initial search.
    pub attempts: u32,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
}
