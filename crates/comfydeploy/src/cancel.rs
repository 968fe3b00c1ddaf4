use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, GenerationError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        out = fut => Ok(out),
    }
}
