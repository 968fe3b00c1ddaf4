//! Run status polling.
//!
//! [`poll_until_complete`] sleeps a fixed interval before every status
//! request and keeps going until the server reports `ended_at`.  Status
//! lines are throttled by [`StatusLogThrottle`] so a long-running job
//! logs on every change plus a periodic liveness line.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, RunApi};
use crate::cancel::cancellable;
use crate::error::GenerationError;
use crate::messages::{RunHandle, RunStatus};

/// Delay before each status request, including the first.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls allowed between status lines when the status is unchanged.
pub const LIVENESS_TICKS: u32 = 20;

/// Tunable polling parameters.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until the run ends, however long that takes.
    pub max_duration: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_duration: None,
        }
    }
}

/// Decides which polls emit a status log line.
#[derive(Debug, Default)]
pub struct StatusLogThrottle {
    last_status: String,
    ticks: u32,
}

impl StatusLogThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one poll's status label; returns `true` when it should be
    /// logged.  Logs on every change and otherwise once every
    /// [`LIVENESS_TICKS`] polls.
    pub fn observe(&mut self, status: &str) -> bool {
        self.ticks += 1;
        if status != self.last_status || self.ticks >= LIVENESS_TICKS {
            self.last_status = status.to_string();
            self.ticks = 0;
            return true;
        }
        false
    }
}

/// Poll `handle` until the run reaches a terminal status.
///
/// Any transport or HTTP failure ends the loop with
/// [`GenerationError::PollFailed`]; an unparseable body ends it with
/// [`GenerationError::Protocol`].  Both the sleep and the request abort
/// with [`GenerationError::Cancelled`] when `cancel` fires.
pub async fn poll_until_complete(
    api: &dyn RunApi,
    handle: &RunHandle,
    options: &PollOptions,
    cancel: &CancellationToken,
) -> Result<RunStatus, GenerationError> {
    let started = Instant::now();
    let mut throttle = StatusLogThrottle::new();

    loop {
        cancellable(cancel, tokio::time::sleep(options.interval)).await?;

        if let Some(limit) = options.max_duration {
            if started.elapsed() >= limit {
                return Err(GenerationError::PollTimeout {
                    run_id: handle.run_id.clone(),
                    limit,
                });
            }
        }

        let raw = cancellable(cancel, api.run_status(&handle.run_id))
            .await?
            .map_err(|e| match e {
                ApiError::Decode(msg) => GenerationError::Protocol(msg),
                source => GenerationError::PollFailed {
                    run_id: handle.run_id.clone(),
                    source,
                },
            })?;

        tracing::debug!(run_id = %handle.run_id, response = %raw, "ComfyDeploy status response");

        let status = RunStatus::from_value(raw).map_err(|e| {
            GenerationError::Protocol(format!("unexpected status response: {e}"))
        })?;

        if throttle.observe(&status.status) {
            tracing::info!(
                run_id = %handle.run_id,
                status = %status.status,
                "ComfyDeploy run status",
            );
        }

        if status.is_terminal() {
            return Ok(status);
        }
    }
}
