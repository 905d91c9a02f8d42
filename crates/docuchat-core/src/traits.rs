use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{Chunk, ChunkId, IndexHit};

/// Finite, non-restartable sequence of generated tokens.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts { out.push(self.embed(t).await?); }
        Ok(out)
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn insert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Nearest chunks to `query`, best first. When `threshold` is set,
    /// hits scoring below it may be omitted.
    async fn top_k(&self, query: &[f32], k: usize, threshold: Option<f32>) -> Result<Vec<IndexHit>>;

    /// Load stored chunks by id. Unknown ids are skipped.
    async fn fetch(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>>;
}
