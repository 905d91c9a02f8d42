//! Retrieval core: HyDE query expansion, similarity search with
//! max-score merging, adaptive deep search, MMR re-ranking and bounded
//! context assembly, wired together by [`RagPipeline`].

pub mod context;
pub mod deep_search;
mod guard;
pub mod hyde;
pub mod mmr;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use context::ContextAssembler;
pub use deep_search::{DeepSearchController, SearchOutcome};
pub use hyde::{HydeExpander, HydeMode};
pub use mmr::MmrReranker;
pub use pipeline::{Answer, RagPipeline};
pub use retriever::Retriever;
