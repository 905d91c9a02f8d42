use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use docuchat_core::error::{Error, Result};
use docuchat_core::settings::ProviderSettings;
use docuchat_core::traits::EmbeddingProvider;

/// Client for an OpenAI-compatible `POST {base}/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    /// Configured dimension, or the one observed on the first response.
    dim: AtomicUsize,
    fixed_dim: bool,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbedder {
    pub fn new(settings: &ProviderSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build().context("Failed to build HTTP client for embeddings")?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", settings.rag_base_url.trim_end_matches('/')),
            model: settings.rag_model.clone(),
            api_key: settings.embedding_api_key().map(str::to_string),
            dim: AtomicUsize::new(settings.embedding_dimensions.unwrap_or(0)),
            fixed_dim: settings.embedding_dimensions.is_some(),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut req = self.client.post(&self.url).json(&EmbedRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key { req = req.bearer_auth(key); }

        let resp = req.send().await.map_err(|e| Error::embedding_unavailable(format!("request to {} failed: {e}", self.url)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::embedding_unavailable(format!("embeddings API returned {status}: {body}")));
        }
        let body: EmbedResponse = resp.json().await.map_err(|e| Error::embedding_unavailable(format!("malformed embeddings response: {e}")))?;
        self.collect(body, texts.len())
    }

    fn collect(&self, body: EmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if body.data.len() != expected {
            return Err(Error::embedding_unavailable(format!("expected {expected} embeddings, got {}", body.data.len())));
        }
        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors { self.check_dim(v.len())?; }
        Ok(vectors)
    }

    fn check_dim(&self, got: usize) -> Result<()> {
        let current = self.dim.load(Ordering::Relaxed);
        if current == 0 && !self.fixed_dim {
            self.dim.store(got, Ordering::Relaxed);
            return Ok(());
        }
        if got != current {
            return Err(Error::embedding_unavailable(format!("embedding dimension {got} does not match expected {current}")));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn dim(&self) -> usize { self.dim.load(Ordering::Relaxed) }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.request(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| Error::embedding_unavailable("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        self.request(texts).await
    }
}
