//! Hypothetical Document Embeddings.
//!
//! A generated answer passage usually sits closer to the stored chunks in
//! embedding space than the question itself. Generation problems never
//! block retrieval: the raw query embedding is used instead.

use std::time::Duration;

use docuchat_core::error::{Provider, Result};
use docuchat_core::traits::{EmbeddingProvider, GenerationProvider};
use docuchat_core::types::{HydeHypothesis, HypothesisOrigin};

use crate::guard::bounded;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydeMode {
    /// One passage from the raw query.
    Shallow,
    /// One passage conditioned on prior context.
    Deep,
}

pub struct HydeExpander<'a> {
    embedder: &'a dyn EmbeddingProvider,
    generator: &'a dyn GenerationProvider,
    timeout: Duration,
    include_query: bool,
    query_embedding: Option<Vec<f32>>,
}

impl<'a> HydeExpander<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, generator: &'a dyn GenerationProvider, timeout: Duration) -> Self {
        Self { embedder, generator, timeout, include_query: false, query_embedding: None }
    }

    /// In shallow mode, also emit the raw query embedding as a second hypothesis.
    pub fn include_query(mut self, include: bool) -> Self {
        self.include_query = include;
        self
    }

    /// Reuse an already computed embedding of the raw query.
    pub fn with_query_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    pub async fn expand(&self, query: &str, mode: HydeMode, prior_context: Option<&str>) -> Result<Vec<HydeHypothesis>> {
        let context = prior_context.filter(|c| !c.trim().is_empty());
        let (prompt, origin) = match (mode, context) {
            (HydeMode::Deep, Some(ctx)) => (prompts::contextual_hypothesis(query, ctx), HypothesisOrigin::ContextAware),
            _ => (prompts::hypothesis(query), HypothesisOrigin::Generated),
        };

        let text = match bounded(Provider::Generation, self.timeout, self.generator.generate(&prompt)).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!(?mode, "hypothesis generation returned no text, searching with the raw query");
                return Ok(vec![self.raw_query(query).await?]);
            }
            Err(e) => {
                tracing::warn!(?mode, error = %e, "hypothesis generation failed, searching with the raw query");
                return Ok(vec![self.raw_query(query).await?]);
            }
        };

        let embedding = bounded(Provider::Embedding, self.timeout, self.embedder.embed(&text)).await?;
        tracing::debug!(?mode, chars = text.len(), "hypothesis generated");
        let mut out = vec![HydeHypothesis { text, embedding, origin }];
        if self.include_query && mode == HydeMode::Shallow {
            out.push(self.raw_query(query).await?);
        }
        Ok(out)
    }

    async fn raw_query(&self, query: &str) -> Result<HydeHypothesis> {
        let embedding = match &self.query_embedding {
            Some(e) => e.clone(),
            None => bounded(Provider::Embedding, self.timeout, self.embedder.embed(query)).await?,
        };
        Ok(HydeHypothesis { text: query.to_string(), embedding, origin: HypothesisOrigin::RawQuery })
    }
}
