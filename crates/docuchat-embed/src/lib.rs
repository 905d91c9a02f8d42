//! Embedding providers.
//!
//! `HashEmbedder` is a deterministic stand-in used for tests and offline
//! runs; `OpenAiEmbedder` talks to any OpenAI-compatible `/embeddings`
//! endpoint. Set `APP_USE_FAKE_EMBEDDINGS=1` to force the hashing embedder.

use std::sync::Arc;

use docuchat_core::settings::ProviderSettings;
use docuchat_core::traits::EmbeddingProvider;

pub mod hash;
pub mod openai;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;

/// Dimension used when neither the session nor the store specify one.
pub const DEFAULT_DIM: usize = 384;

pub fn default_embedder(settings: &ProviderSettings) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let use_fake = settings.use_fake_embeddings
        || std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake {
        let dim = settings.embedding_dimensions.unwrap_or(DEFAULT_DIM);
        tracing::info!(dim, "using hashing embedder");
        return Ok(Arc::new(HashEmbedder::new(dim)));
    }
    tracing::info!(model = %settings.rag_model, base_url = %settings.rag_base_url, "using OpenAI-compatible embedder");
    Ok(Arc::new(OpenAiEmbedder::new(settings)?))
}
