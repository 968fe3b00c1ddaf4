//! HTTP client for the ComfyDeploy run API.
//!
//! [`RunApi`] is the transport seam the job driver talks to; the
//! production implementation, [`ComfyDeployApi`], wraps [`reqwest`]
//! with bearer-token authentication.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DeploySettings;
use crate::messages::JobPayload;

/// Errors from the ComfyDeploy HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("ComfyDeploy API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Operations the job driver needs from the remote service.
///
/// Responses are returned as raw JSON so that field extraction and
/// protocol checks stay in one place regardless of transport.
#[async_trait]
pub trait RunApi: Send + Sync {
    /// `POST <endpoint>` with the payload as JSON body.
    async fn submit(&self, payload: &JobPayload) -> Result<serde_json::Value, ApiError>;

    /// `GET <endpoint>?run_id=<id>`.
    async fn run_status(&self, run_id: &str) -> Result<serde_json::Value, ApiError>;

    /// Plain `GET <url>` returning the raw body.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// reqwest-backed [`RunApi`] for one configured endpoint.
pub struct ComfyDeployApi {
    client: reqwest::Client,
    settings: Arc<DeploySettings>,
}

impl ComfyDeployApi {
    pub fn new(settings: Arc<DeploySettings>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// Non-2xx responses become [`ApiError::Status`] carrying the body,
    /// which ComfyDeploy fills with its error message.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Parse a successful JSON response body.
    async fn parse_response(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let response = Self::check_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{e}: {text}")))
    }
}

#[async_trait]
impl RunApi for ComfyDeployApi {
    async fn submit(&self, payload: &JobPayload) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .post(&self.settings.api_endpoint)
            .bearer_auth(&self.settings.auth_token)
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn run_status(&self, run_id: &str) -> Result<serde_json::Value, ApiError> {
        let response = self
            .client
            .get(&self.settings.api_endpoint)
            .bearer_auth(&self.settings.auth_token)
            .query(&[("run_id", run_id)])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
