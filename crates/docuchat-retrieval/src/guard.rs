use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use docuchat_core::error::{Error, Provider, Result};

/// Bound a provider call by `limit`; expiry is reported as that provider being unavailable.
pub(crate) async fn bounded<T, F>(provider: Provider, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::ProviderUnavailable { provider, reason: format!("timed out after {limit:?}") }),
    }
}

/// Abandon `fut` as soon as the request is cancelled.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}
