//! Concurrent download of a finished run's outputs.

use std::sync::Arc;

use comfydeploy_core::asset::{extension_from_filename, DecodedImage};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::RunApi;
use crate::cancel::cancellable;
use crate::error::GenerationError;
use crate::messages::RunStatus;
use crate::sink::OutputSink;

/// Download every image referenced by `status` and hand each one to
/// `sink` as soon as it arrives.
///
/// One task is spawned per image with no concurrency cap.  The first
/// failed download wins: later results are drained and discarded, and
/// nothing more reaches the sink.  Returns only once every task has
/// finished, with the number of assets delivered.
pub async fn retrieve_outputs(
    api: Arc<dyn RunApi>,
    status: &RunStatus,
    sink: &mut dyn OutputSink,
    cancel: &CancellationToken,
) -> Result<usize, GenerationError> {
    let mut downloads = JoinSet::new();

    for image in status.image_refs() {
        let api = Arc::clone(&api);
        let cancel = cancel.clone();
        let url = image.url.clone();
        let format = extension_from_filename(&image.filename);

        downloads.spawn(async move {
            let bytes = cancellable(&cancel, api.download(&url))
                .await?
                .map_err(|source| GenerationError::DownloadFailed {
                    url: url.clone(),
                    source,
                })?;
            tracing::debug!(url = %url, size = bytes.len(), format = %format, "Downloaded output");
            Ok::<_, GenerationError>(DecodedImage::new(bytes, format))
        });
    }

    tracing::info!(count = downloads.len(), "Downloading ComfyDeploy outputs");

    let mut delivered = 0;
    let mut first_error: Option<GenerationError> = None;

    while let Some(joined) = downloads.join_next().await {
        let result = joined
            .map_err(|e| GenerationError::Internal(format!("download task panicked: {e}")))
            .and_then(|r| r);

        match result {
            Ok(image) if first_error.is_none() => {
                sink.deliver(image);
                delivered += 1;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Output download failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(delivered),
    }
}
