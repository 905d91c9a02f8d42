//! Per-session settings consumed by the retrieval pipeline and by the
//! provider adapters.
//!
//! Settings are plain values passed by reference into each pipeline call;
//! concurrent sessions never share mutable configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::CandidateSet;

/// How retrieval confidence is derived from a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfidenceMetric {
    /// Best score among candidates.
    MaxScore,
    /// Mean of the best `n` scores.
    MeanTopN { n: usize },
}

impl Default for ConfidenceMetric {
    fn default() -> Self { ConfidenceMetric::MaxScore }
}

impl ConfidenceMetric {
    /// Confidence of `candidates`; 0 for an empty set.
    pub fn score(&self, candidates: &CandidateSet) -> f32 {
        match *self {
            ConfidenceMetric::MaxScore => candidates.max_score().unwrap_or(0.0),
            ConfidenceMetric::MeanTopN { n } => {
                let top = candidates.top(n);
                if top.is_empty() { return 0.0; }
                top.iter().map(|c| c.score).sum::<f32>() / top.len() as f32
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Score a result must reach to count as a confident answer.
    pub similarity_threshold: f32,
    pub deep_search_enabled: bool,
    /// Looser threshold used for every search while deep search is on.
    pub deep_search_initial_threshold: f32,
    /// Character budget of the assembled context block.
    pub context_max_length: usize,
    /// Nearest neighbours fetched per hypothesis.
    pub top_k: usize,
    /// Chunks kept after MMR re-ranking.
    pub mmr_k: usize,
    pub mmr_lambda: f32,
    /// Upper bound on escalation rounds after the initial search.
    pub max_attempts: u32,
    pub confidence: ConfidenceMetric,
    /// Best chunks fed back into context-aware HyDE.
    pub context_chunks: usize,
    /// Also search with the raw query embedding next to the hypothesis.
    pub hyde_include_query: bool,
    pub provider_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            deep_search_enabled: true,
            deep_search_initial_threshold: 0.3,
            context_max_length: 4096,
            top_k: 20,
            mmr_k: 8,
            mmr_lambda: 0.7,
            max_attempts: 3,
            confidence: ConfidenceMetric::MaxScore,
            context_chunks: 3,
            hyde_include_query: false,
            provider_timeout_ms: 30_000,
        }
    }
}

impl RetrievalSettings {
    /// Range sanity only; full validation belongs to the session owner.
    pub fn validate(&self) -> Result<()> {
        check_unit("similarity_threshold", self.similarity_threshold)?;
        check_unit("deep_search_initial_threshold", self.deep_search_initial_threshold)?;
        check_unit("mmr_lambda", self.mmr_lambda)?;
        if self.top_k == 0 { return Err(Error::InvalidConfig("top_k must be at least 1".into())); }
        if self.mmr_k == 0 { return Err(Error::InvalidConfig("mmr_k must be at least 1".into())); }
        if self.max_attempts == 0 { return Err(Error::InvalidConfig("max_attempts must be at least 1".into())); }
        if let ConfidenceMetric::MeanTopN { n: 0 } = self.confidence {
            return Err(Error::InvalidConfig("confidence mean_top_n needs n >= 1".into()));
        }
        if self.provider_timeout_ms == 0 {
            return Err(Error::InvalidConfig("provider_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Threshold applied to every search of this query.
    pub fn search_threshold(&self) -> f32 {
        if self.deep_search_enabled { self.deep_search_initial_threshold } else { self.similarity_threshold }
    }

    pub fn provider_timeout(&self) -> Duration { Duration::from_millis(self.provider_timeout_ms) }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfig(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

/// Connection settings for the OpenAI-compatible chat and embedding APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
    pub rag_base_url: String,
    pub rag_model: String,
    /// Falls back to `openai_api_key` when unset.
    pub rag_api_key: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub use_fake_embeddings: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_api_key: None,
            rag_base_url: "https://api.openai.com/v1".to_string(),
            rag_model: "text-embedding-3-small".to_string(),
            rag_api_key: None,
            embedding_dimensions: None,
            use_fake_embeddings: false,
        }
    }
}

impl ProviderSettings {
    pub fn embedding_api_key(&self) -> Option<&str> {
        self.rag_api_key.as_deref().or(self.openai_api_key.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// LanceDB directory; `~` and `${VAR}` are expanded.
    pub uri: String,
    pub table: String,
}

impl Default for IndexSettings {
    fn default() -> Self { Self { uri: "./data/lancedb".to_string(), table: "chunks".to_string() } }
}
