//! Run submission.

use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, RunApi};
use crate::cancel::cancellable;
use crate::error::GenerationError;
use crate::messages::{JobPayload, RunHandle};

/// Send `payload` once and return the handle of the created run.
///
/// Transport failures and non-2xx responses surface as
/// [`GenerationError::SubmissionFailed`]; a body without a `run_id` (or
/// one that is not JSON) is a [`GenerationError::Protocol`].  Never
/// retried here.
pub async fn submit_job(
    api: &dyn RunApi,
    payload: &JobPayload,
    cancel: &CancellationToken,
) -> Result<RunHandle, GenerationError> {
    tracing::trace!(
        workflow_id = %payload.workflow_id,
        machine_id = %payload.machine_id,
        workflow = %payload.workflow_api,
        "Sending ComfyDeploy run request",
    );

    let response = cancellable(cancel, api.submit(payload))
        .await?
        .map_err(|e| match e {
            ApiError::Decode(msg) => GenerationError::Protocol(msg),
            other => GenerationError::SubmissionFailed(other),
        })?;

    let handle = RunHandle::from_response(&response).map_err(GenerationError::Protocol)?;

    tracing::info!(run_id = %handle.run_id, "ComfyDeploy run submitted");
    Ok(handle)
}
