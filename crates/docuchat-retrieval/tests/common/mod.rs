#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use docuchat_core::error::{Error, Result};
use docuchat_core::traits::{EmbeddingProvider, GenerationProvider, TokenStream, VectorIndex};
use docuchat_core::types::{Chunk, ChunkId, IndexHit, Meta};

pub const DIM: usize = 4;

pub fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
    Chunk { id: id.into(), document_id: format!("doc-{id}"), text: text.into(), embedding, metadata: Meta::new() }
}

pub fn hit(id: &str, score: f32) -> IndexHit { IndexHit { id: id.into(), score } }

/// Embeds known texts to fixed vectors; anything else maps to `fallback`.
pub struct KeyedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl KeyedEmbedder {
    pub fn new() -> Self {
        Self { vectors: HashMap::new(), fallback: vec![1.0, 0.0, 0.0, 0.0], fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn with(mut self, text: &str, v: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), v);
        self
    }

    pub fn failing() -> Self { Self { fail: true, ..Self::new() } }
}

#[async_trait]
impl EmbeddingProvider for KeyedEmbedder {
    fn dim(&self) -> usize { DIM }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail { return Err(Error::embedding_unavailable("scripted failure")); }
        Ok(self.vectors.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Replays scripted responses in order, then repeats `default`.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String>>>,
    default: String,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(default: &str) -> Self {
        Self { responses: Mutex::new(VecDeque::new()), default: default.into(), delay: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn then(self, response: Result<String>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> { self.prompts.lock().unwrap().clone() }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(d) = self.delay { tokio::time::sleep(d).await; }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.default.clone()))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        let text = self.generate(prompt).await?;
        let tokens: Vec<Result<String>> = text.split_inclusive(' ').map(|t| Ok(t.to_string())).collect();
        Ok(Box::pin(stream::iter(tokens)))
    }
}

pub enum Step {
    Hits(Vec<IndexHit>),
    Fail,
    Stall(Duration),
    /// Answer with `hits` after `delay`.
    Slow(Duration, Vec<IndexHit>),
}

/// Index whose k-NN answers are scripted per call; the last step repeats.
pub struct ScriptedIndex {
    steps: Mutex<VecDeque<Step>>,
    chunks: HashMap<ChunkId, Chunk>,
    pub searches: AtomicUsize,
}

impl ScriptedIndex {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            chunks: chunks.into_iter().map(|c| (c.id.clone(), c)).collect(),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn searches(&self) -> usize { self.searches.load(Ordering::SeqCst) }

    fn next_step(&self) -> Option<Step> {
        let mut steps = self.steps.lock().unwrap();
        match steps.len() {
            0 => None,
            1 => steps.front().map(|s| match s {
                Step::Hits(h) => Step::Hits(h.clone()),
                Step::Fail => Step::Fail,
                Step::Stall(d) => Step::Stall(*d),
                Step::Slow(d, h) => Step::Slow(*d, h.clone()),
            }),
            _ => steps.pop_front(),
        }
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn insert(&self, _chunks: &[Chunk]) -> Result<()> { Ok(()) }

    async fn top_k(&self, _query: &[f32], k: usize, _threshold: Option<f32>) -> Result<Vec<IndexHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            None => Ok(Vec::new()),
            Some(Step::Hits(mut hits)) => {
                hits.truncate(k);
                Ok(hits)
            }
            Some(Step::Fail) => Err(Error::index_unavailable("connection refused")),
            Some(Step::Stall(d)) => {
                tokio::time::sleep(d).await;
                Ok(Vec::new())
            }
            Some(Step::Slow(d, mut hits)) => {
                tokio::time::sleep(d).await;
                hits.truncate(k);
                Ok(hits)
            }
        }
    }

    async fn fetch(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        Ok(ids.iter().filter_map(|id| self.chunks.get(id).cloned()).collect())
    }
}
