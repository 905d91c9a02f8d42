//! Query-to-answer facade over the retrieval components.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use docuchat_core::error::{Error, Provider, Result};
use docuchat_core::settings::RetrievalSettings;
use docuchat_core::traits::{EmbeddingProvider, GenerationProvider, TokenStream, VectorIndex};
use docuchat_core::types::{ChunkRecord, RetrievalResult};

use crate::context::ContextAssembler;
use crate::deep_search::DeepSearchController;
use crate::guard::{bounded, cancellable};
use crate::hyde::HydeExpander;
use crate::mmr::MmrReranker;
use crate::prompts;
use crate::retriever::Retriever;

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub retrieval: RetrievalResult,
}

/// Shared provider handles plus the per-request retrieval flow.
///
/// The pipeline holds no per-query state; concurrent requests may share
/// one instance and one `RetrievalSettings`.
#[derive(Clone)]
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    index: Arc<dyn VectorIndex>,
    assembler: ContextAssembler,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self { embedder, generator, index, assembler: ContextAssembler::default() }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Embed and store externally split chunks, `batch_size` at a time.
    ///
    /// `on_batch` receives the number of chunks stored so far.
    pub async fn index_chunks<F>(&self, records: Vec<ChunkRecord>, batch_size: usize, mut on_batch: F) -> Result<usize>
    where
        F: FnMut(usize),
    {
        let batch_size = batch_size.max(1);
        let mut stored = 0;
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let batch: Vec<ChunkRecord> = records.by_ref().take(batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::embedding_unavailable(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            let chunks: Vec<_> = batch.into_iter().zip(embeddings).map(|(r, e)| r.into_chunk(e)).collect();
            self.index.insert(&chunks).await?;
            stored += chunks.len();
            on_batch(stored);
            tracing::debug!(stored, "indexed batch");
        }
        tracing::info!(stored, "indexing complete");
        Ok(stored)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        settings: &RetrievalSettings,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        settings.validate()?;
        if cancel.is_cancelled() { return Err(Error::Cancelled); }
        let timeout = settings.provider_timeout();

        let query_embedding =
            cancellable(cancel, bounded(Provider::Embedding, timeout, self.embedder.embed(query))).await?;

        let expander = HydeExpander::new(self.embedder.as_ref(), self.generator.as_ref(), timeout)
            .include_query(settings.hyde_include_query)
            .with_query_embedding(query_embedding.clone());
        let retriever = Retriever::new(self.index.as_ref(), timeout);
        let outcome = DeepSearchController::new(&expander, &retriever, settings).run(query, cancel).await?;

        let chunks = MmrReranker::new().rerank(outcome.candidates, &query_embedding, settings.mmr_k, settings.mmr_lambda);
        Ok(RetrievalResult {
            chunks,
            confidence: outcome.confidence,
            used_deep_search: outcome.used_deep_search,
            attempts: outcome.attempts,
        })
    }

    pub fn assemble_context(&self, result: &RetrievalResult, settings: &RetrievalSettings) -> String {
        self.assembler.assemble(&result.chunks, settings.context_max_length)
    }

    pub async fn answer(&self, query: &str, settings: &RetrievalSettings, cancel: &CancellationToken) -> Result<Answer> {
        let retrieval = self.retrieve(query, settings, cancel).await?;
        let prompt = prompts::answer(query, &self.assemble_context(&retrieval, settings));
        let text = cancellable(
            cancel,
            bounded(Provider::Generation, settings.provider_timeout(), self.generator.generate(&prompt)),
        )
        .await?;
        Ok(Answer { text, retrieval })
    }

    /// Like [`answer`](Self::answer) but streams tokens. The stream ends early once `cancel` fires.
    pub async fn answer_stream(
        &self,
        query: &str,
        settings: &RetrievalSettings,
        cancel: &CancellationToken,
    ) -> Result<(RetrievalResult, TokenStream)> {
        let retrieval = self.retrieve(query, settings, cancel).await?;
        let prompt = prompts::answer(query, &self.assemble_context(&retrieval, settings));
        let stream = cancellable(
            cancel,
            bounded(Provider::Generation, settings.provider_timeout(), self.generator.generate_stream(&prompt)),
        )
        .await?;
        let stream: TokenStream = Box::pin(stream.take_until(cancel.clone().cancelled_owned()));
        Ok((retrieval, stream))
    }
}
