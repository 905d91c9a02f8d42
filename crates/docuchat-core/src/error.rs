use std::fmt;

use thiserror::Error;

/// External collaborator a failed call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Embedding,
    Generation,
    Index,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Embedding => write!(f, "Embedding provider"),
            Provider::Generation => write!(f, "Generation provider"),
            Provider::Index => write!(f, "Vector index"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: Provider, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    pub fn embedding_unavailable(reason: impl fmt::Display) -> Self {
        Self::ProviderUnavailable { provider: Provider::Embedding, reason: reason.to_string() }
    }

    pub fn generation_unavailable(reason: impl fmt::Display) -> Self {
        Self::ProviderUnavailable { provider: Provider::Generation, reason: reason.to_string() }
    }

    pub fn index_unavailable(reason: impl fmt::Display) -> Self {
        Self::ProviderUnavailable { provider: Provider::Index, reason: reason.to_string() }
    }

    /// The provider that failed, if this is a provider failure.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            Error::ProviderUnavailable { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    pub fn is_provider_unavailable(&self) -> bool { self.provider().is_some() }
}

pub type Result<T> = std::result::Result<T, Error>;
