//! Scripted in-memory [`RunApi`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use crate::api::{ApiError, RunApi};
use crate::messages::JobPayload;

struct DownloadScript {
    result: Result<Vec<u8>, u16>,
    delay: Duration,
}

/// Replays a fixed submit response, a queue of status responses, and a
/// table of downloads.  Once the status queue is empty every poll sees
/// a non-terminal `running` status.
pub(crate) struct ScriptedApi {
    submit_response: Mutex<Option<Result<serde_json::Value, ApiError>>>,
    statuses: Mutex<VecDeque<Result<serde_json::Value, ApiError>>>,
    status_delay: Duration,
    downloads: Mutex<HashMap<String, DownloadScript>>,
    submitted: Mutex<Vec<JobPayload>>,
    submit_calls: AtomicUsize,
    poll_times: Mutex<Vec<Instant>>,
    download_calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new(submit_response: Result<serde_json::Value, ApiError>) -> Self {
        Self {
            submit_response: Mutex::new(Some(submit_response)),
            statuses: Mutex::new(VecDeque::new()),
            status_delay: Duration::ZERO,
            downloads: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            submit_calls: AtomicUsize::new(0),
            poll_times: Mutex::new(Vec::new()),
            download_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn status(self, response: serde_json::Value) -> Self {
        self.statuses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn status_error(self, error: ApiError) -> Self {
        self.statuses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Every status request takes `delay` before answering.
    pub fn status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn download(self, url: &str, bytes: &[u8]) -> Self {
        self.delayed_download(url, bytes, Duration::ZERO)
    }

    pub fn delayed_download(self, url: &str, bytes: &[u8], delay: Duration) -> Self {
        self.downloads.lock().unwrap().insert(
            url.to_string(),
            DownloadScript {
                result: Ok(bytes.to_vec()),
                delay,
            },
        );
        self
    }

    pub fn failed_download(self, url: &str, status: u16) -> Self {
        self.downloads.lock().unwrap().insert(
            url.to_string(),
            DownloadScript {
                result: Err(status),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<JobPayload> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.poll_times.lock().unwrap().clone()
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_times.lock().unwrap().len()
    }

    pub fn download_calls(&self) -> Vec<String> {
        self.download_calls.lock().unwrap().clone()
    }
}

/// A non-terminal status body.
pub(crate) fn running() -> serde_json::Value {
    json!({"status": "running", "ended_at": null, "outputs": []})
}

/// A terminal status body listing `files` as `(filename, url)` pairs in
/// a single output.
pub(crate) fn finished(files: &[(&str, &str)]) -> serde_json::Value {
    let images: Vec<serde_json::Value> = files
        .iter()
        .map(|(filename, url)| json!({"filename": filename, "url": url}))
        .collect();
    json!({
        "status": "success",
        "ended_at": "2024-01-01T00:00:00Z",
        "outputs": [{"data": {"images": images}}],
    })
}

#[async_trait]
impl RunApi for ScriptedApi {
    async fn submit(&self, payload: &JobPayload) -> Result<serde_json::Value, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(payload.clone());
        self.submit_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| {
                Err(ApiError::Status {
                    status: 409,
                    body: "already submitted".into(),
                })
            })
    }

    async fn run_status(&self, _run_id: &str) -> Result<serde_json::Value, ApiError> {
        self.poll_times.lock().unwrap().push(Instant::now());
        tokio::time::sleep(self.status_delay).await;
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(running()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.download_calls.lock().unwrap().push(url.to_string());
        let script = self
            .downloads
            .lock()
            .unwrap()
            .get(url)
            .map(|s| (s.result.clone(), s.delay));

        let Some((result, delay)) = script else {
            return Err(ApiError::Status {
                status: 404,
                body: format!("no such file: {url}"),
            });
        };

        tokio::time::sleep(delay).await;
        result.map_err(|status| ApiError::Status {
            status,
            body: "download failed".into(),
        })
    }
}
