//! ComfyDeploy run API message types.
//!
//! Submission sends a [`JobPayload`]; the response carries a `run_id`.
//! Status polls return `{"status", "ended_at", "outputs"}` which parse
//! into [`RunStatus`].  A run is terminal once `ended_at` is non-null.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of the "start run" request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPayload {
    pub workflow_id: String,
    pub machine_id: String,
    /// Complete ComfyUI API workflow for this run.
    pub workflow_api: serde_json::Value,
}

/// Identifies a submitted run for every subsequent status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
}

impl RunHandle {
    /// Extract the run ID from a submission response.
    ///
    /// Accepts a string or numeric `run_id`; anything else is a
    /// protocol violation.
    pub fn from_response(response: &serde_json::Value) -> Result<Self, String> {
        match response.get("run_id") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(Self {
                run_id: id.clone(),
            }),
            Some(serde_json::Value::Number(n)) => Ok(Self {
                run_id: n.to_string(),
            }),
            _ => Err(format!("submission response has no run_id: {response}")),
        }
    }
}

/// Snapshot of a run's state, re-fetched on every poll.
#[derive(Debug, Clone, Deserialize)]
pub struct RunStatus {
    /// Free-form status label, e.g. `queued`, `running`, `success`.
    pub status: String,
    /// Completion marker; `None` while the run is still in progress.
    /// Any non-null value counts; its format is not interpreted.
    #[serde(default)]
    pub ended_at: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<RunOutput>,
}

impl RunStatus {
    /// Parse a raw status response.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// A run is finished once the server stamps `ended_at`.
    pub fn is_terminal(&self) -> bool {
        self.ended_at.is_some()
    }

    /// All image references across every output, in response order.
    pub fn image_refs(&self) -> impl Iterator<Item = &ImageRef> {
        self.outputs.iter().flat_map(|o| o.data.images.iter())
    }
}

/// One output node's result.
#[derive(Debug, Clone, Deserialize)]
pub struct RunOutput {
    #[serde(default)]
    pub data: OutputData,
}

/// Files produced by an output node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageRef>,
}

/// A downloadable output file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    pub url: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
