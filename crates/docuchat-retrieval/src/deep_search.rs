//! Iterative widening of a weak shallow search.
//!
//! The controller is a small state machine driven by a loop with an
//! explicit attempt counter:
//!
//! ```text
//! Initial -> Evaluating -> Escalating -> Evaluating -> ... -> Done
//! ```
//!
//! Only the initial search may fail the query. An escalation round that
//! fails or times out ends the loop with whatever was accumulated.

use tokio_util::sync::CancellationToken;

use docuchat_core::error::{Error, Result};
use docuchat_core::settings::RetrievalSettings;
use docuchat_core::types::CandidateSet;

use crate::guard::cancellable;
use crate::hyde::{HydeExpander, HydeMode};
use crate::retriever::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Initial,
    Evaluating,
    Escalating,
    Done,
}

/// Per-query loop state; dropped when the loop terminates.
#[derive(Debug, Default)]
pub struct DeepSearchState {
    /// Escalation rounds performed so far.
    pub attempt: u32,
    pub threshold: f32,
    pub accumulated: CandidateSet,
    pub exhausted: bool,
}

/// What the loop hands back before re-ranking.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub candidates: CandidateSet,
    pub confidence: f32,
    pub used_deep_search: bool,
    pub attempts: u32,
}

pub struct DeepSearchController<'a> {
    expander: &'a HydeExpander<'a>,
    retriever: &'a Retriever<'a>,
    settings: &'a RetrievalSettings,
}

impl<'a> DeepSearchController<'a> {
    pub fn new(expander: &'a HydeExpander<'a>, retriever: &'a Retriever<'a>, settings: &'a RetrievalSettings) -> Self {
        Self { expander, retriever, settings }
    }

    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> Result<SearchOutcome> {
        let settings = self.settings;
        let mut state = DeepSearchState { threshold: settings.search_threshold(), ..Default::default() };
        let mut phase = SearchPhase::Initial;

        loop {
            phase = match phase {
                SearchPhase::Initial => {
                    state.accumulated = cancellable(cancel, self.search(query, HydeMode::Shallow, None, state.threshold)).await?;
                    tracing::debug!(candidates = state.accumulated.len(), threshold = state.threshold, "initial search");
                    if settings.deep_search_enabled { SearchPhase::Evaluating } else { SearchPhase::Done }
                }
                SearchPhase::Evaluating => {
                    let confidence = settings.confidence.score(&state.accumulated);
                    if confidence >= settings.similarity_threshold {
                        SearchPhase::Done
                    } else if state.attempt >= settings.max_attempts || state.exhausted {
                        tracing::debug!(confidence, attempts = state.attempt, "deep search gave up below threshold");
                        SearchPhase::Done
                    } else {
                        SearchPhase::Escalating
                    }
                }
                SearchPhase::Escalating => {
                    if cancel.is_cancelled() { return Err(Error::Cancelled); }
                    let context = self.seed_context(&state.accumulated);
                    let round = self.search(query, HydeMode::Deep, Some(context.as_str()), state.threshold);
                    match cancellable(cancel, round).await {
                        Ok(found) => {
                            tracing::debug!(attempt = state.attempt + 1, found = found.len(), "escalation round");
                            state.accumulated.merge(found);
                        }
                        Err(Error::Cancelled) => return Err(Error::Cancelled),
                        Err(e) => {
                            tracing::warn!(attempt = state.attempt + 1, error = %e, "escalation failed, keeping accumulated candidates");
                            state.exhausted = true;
                        }
                    }
                    state.attempt += 1;
                    SearchPhase::Evaluating
                }
                SearchPhase::Done => break,
            };
        }

        let confidence = settings.confidence.score(&state.accumulated);
        tracing::info!(
            candidates = state.accumulated.len(),
            confidence,
            attempts = state.attempt,
            "retrieval finished"
        );
        Ok(SearchOutcome {
            candidates: state.accumulated,
            confidence,
            used_deep_search: state.attempt > 0,
            attempts: state.attempt,
        })
    }

    async fn search(&self, query: &str, mode: HydeMode, context: Option<&str>, threshold: f32) -> Result<CandidateSet> {
        let hypotheses = self.expander.expand(query, mode, context).await?;
        self.retriever.retrieve(&hypotheses, self.settings.top_k, threshold).await
    }

    fn seed_context(&self, accumulated: &CandidateSet) -> String {
        accumulated
            .top(self.settings.context_chunks)
            .iter()
            .map(|c| c.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
