//! Chat-completion provider over an OpenAI-compatible API.

pub mod openai;
pub mod sse;

pub use openai::OpenAiGenerator;
