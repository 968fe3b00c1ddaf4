use std::time::Duration;

use crate::api::ApiError;
use crate::backend::BackendStatus;

/// Why a single generation attempt failed.
///
/// None of these are retried inside the backend; the host owns any
/// retry policy.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The workflow could not be built into a valid payload.
    #[error("Failed to build job payload: {0}")]
    Build(String),

    /// The submit call failed in transport or returned a non-2xx status.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(#[source] ApiError),

    /// A submit or poll response was unparseable or missing a field.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A status request failed in transport or returned a non-2xx status.
    #[error("Status poll for run {run_id} failed: {source}")]
    PollFailed {
        run_id: String,
        #[source]
        source: ApiError,
    },

    /// An output download returned a non-success status.
    #[error("Download of {url} failed: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: ApiError,
    },

    /// The process-wide cancellation token fired.
    #[error("Generation cancelled")]
    Cancelled,

    /// The configured maximum poll duration elapsed.
    #[error("Run {run_id} did not finish within {limit:?}")]
    PollTimeout { run_id: String, limit: Duration },

    #[error("Backend is not running (status: {0})")]
    NotRunning(BackendStatus),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Lifecycle failures of a backend instance.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Invalid status transition {from} -> {to}")]
    InvalidTransition {
        from: BackendStatus,
        to: BackendStatus,
    },

    #[error("Validation failed: {0}")]
    Validation(String),
}
