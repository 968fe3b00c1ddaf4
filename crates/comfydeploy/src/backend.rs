//! ComfyDeploy backend lifecycle and job driver.
//!
//! [`ComfyDeployBackend`] is created once per configured backend and
//! shared (behind an `Arc`) by every generation the host routes to it.
//! Each call to [`generate_live`](ComfyDeployBackend::generate_live)
//! drives one job end to end: build payload -> submit -> poll ->
//! download.  Job state is local to that call.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use comfydeploy_core::asset::DecodedImage;
use comfydeploy_core::request::{FeatureSet, GenerationRequest, DEFAULT_FEATURES};
use comfydeploy_core::workflow::{Txt2ImgWorkflowBuilder, WorkflowBuilder};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::api::{ComfyDeployApi, RunApi};
use crate::config::DeploySettings;
use crate::error::{BackendError, GenerationError};
use crate::payload::build_payload;
use crate::poller::{poll_until_complete, PollOptions};
use crate::retriever::retrieve_outputs;
use crate::sink::{CollectSink, OutputSink};
use crate::submitter::submit_job;

/// Registration metadata a host uses to list this backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTypeInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub can_load_fast: bool,
    pub is_standard: bool,
}

pub const BACKEND_TYPE: BackendTypeInfo = BackendTypeInfo {
    id: "comfy_deploy_api",
    name: "ComfyDeploy",
    description: "ComfyDeploy.com API backend.",
    can_load_fast: true,
    is_standard: true,
};

/// Lifecycle state of a backend instance.
///
/// Only `Uninitialized -> Running` and `Running -> Disabled` occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Uninitialized,
    Running,
    Disabled,
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendStatus::Uninitialized => "uninitialized",
            BackendStatus::Running => "running",
            BackendStatus::Disabled => "disabled",
        };
        f.write_str(label)
    }
}

/// Optional checks that the remote side is usable.
///
/// Only consulted when the matching setting is enabled.
#[async_trait]
pub trait BackendValidator: Send + Sync {
    /// Confirm the API is reachable and the credentials are accepted.
    async fn check_connection(&self) -> Result<(), String>;

    /// Whether `model` exists on the configured machine.
    async fn check_model(&self, model: &str) -> Result<bool, String>;
}

/// A ComfyDeploy-backed image generation backend.
pub struct ComfyDeployBackend {
    settings: Arc<DeploySettings>,
    api: Arc<dyn RunApi>,
    builder: Arc<dyn WorkflowBuilder>,
    validator: Option<Arc<dyn BackendValidator>>,
    features: FeatureSet,
    status: RwLock<BackendStatus>,
    max_usages: AtomicUsize,
    current_model: RwLock<Option<String>>,
    /// Process-wide cancellation token, owned by the host.
    cancel: CancellationToken,
}

impl ComfyDeployBackend {
    /// Backend talking to the configured endpoint over HTTP with the
    /// default text-to-image workflow builder.
    pub fn new(settings: DeploySettings, cancel: CancellationToken) -> Self {
        let settings = Arc::new(settings);
        let api = Arc::new(ComfyDeployApi::new(Arc::clone(&settings)));
        Self::with_parts(settings, api, Arc::new(Txt2ImgWorkflowBuilder), cancel)
    }

    /// Backend over an explicit transport and workflow builder.
    pub fn with_parts(
        settings: Arc<DeploySettings>,
        api: Arc<dyn RunApi>,
        builder: Arc<dyn WorkflowBuilder>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            api,
            builder,
            validator: None,
            features: FeatureSet::new(DEFAULT_FEATURES.iter().copied()),
            status: RwLock::new(BackendStatus::Uninitialized),
            max_usages: AtomicUsize::new(1),
            current_model: RwLock::new(None),
            cancel,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn BackendValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    pub fn supported_features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    pub async fn status(&self) -> BackendStatus {
        *self.status.read().await
    }

    /// Advisory cap on concurrent generations the host should route here.
    pub fn max_usages(&self) -> usize {
        self.max_usages.load(Ordering::Relaxed)
    }

    pub async fn current_model(&self) -> Option<String> {
        self.current_model.read().await.clone()
    }

    /// Bring the backend up.
    ///
    /// Sets the capacity hint and moves `Uninitialized -> Running`.  No
    /// connectivity check runs unless `validate_on_init` is enabled and a
    /// validator is attached.
    pub async fn init(&self) -> Result<(), BackendError> {
        let mut status = self.status.write().await;
        if *status != BackendStatus::Uninitialized {
            return Err(BackendError::InvalidTransition {
                from: *status,
                to: BackendStatus::Running,
            });
        }

        if self.settings.validate_on_init {
            match &self.validator {
                Some(validator) => validator
                    .check_connection()
                    .await
                    .map_err(BackendError::Validation)?,
                None => tracing::warn!("validate_on_init is set but no validator is attached"),
            }
        }

        self.max_usages
            .store(self.settings.max_usages(), Ordering::Relaxed);
        *status = BackendStatus::Running;

        tracing::info!(
            endpoint = %self.settings.api_endpoint,
            max_usages = self.settings.max_usages(),
            "ComfyDeploy backend running",
        );
        Ok(())
    }

    /// Run one generation, streaming each asset to `sink` as it arrives.
    pub async fn generate_live(
        &self,
        request: &GenerationRequest,
        sink: &mut dyn OutputSink,
    ) -> Result<(), GenerationError> {
        let status = self.status().await;
        if status != BackendStatus::Running {
            return Err(GenerationError::NotRunning(status));
        }

        let result = self.run_job(request, sink).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "ComfyDeploy generation failed");
        }
        result
    }

    /// Run one generation and return every asset in delivery order.
    ///
    /// A failed job yields an error, never a partial list.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<DecodedImage>, GenerationError> {
        let mut sink = CollectSink::new();
        self.generate_live(request, &mut sink).await?;
        Ok(sink.into_images())
    }

    /// Record `model` as the selected model.
    ///
    /// Returns `false` only when model validation is enabled and the
    /// validator reports the model missing.
    pub async fn load_model(&self, model: &str) -> Result<bool, BackendError> {
        if self.settings.validate_models {
            if let Some(validator) = &self.validator {
                let exists = validator
                    .check_model(model)
                    .await
                    .map_err(BackendError::Validation)?;
                if !exists {
                    tracing::warn!(model, "Model not found on ComfyDeploy machine");
                    return Ok(false);
                }
            }
        }

        *self.current_model.write().await = Some(model.to_string());
        tracing::info!(model, "ComfyDeploy model selected");
        Ok(true)
    }

    /// Move `Running -> Disabled`.  A no-op in any other state.
    pub async fn shutdown(&self) {
        let mut status = self.status.write().await;
        if *status == BackendStatus::Running {
            *status = BackendStatus::Disabled;
            tracing::info!("ComfyDeploy backend disabled");
        }
    }

    // ---- private helpers ----

    async fn run_job(
        &self,
        request: &GenerationRequest,
        sink: &mut dyn OutputSink,
    ) -> Result<(), GenerationError> {
        let payload = build_payload(&self.settings, self.builder.as_ref(), request, &self.features)?;
        let handle = submit_job(self.api.as_ref(), &payload, &self.cancel).await?;

        let options = PollOptions {
            max_duration: self.settings.max_poll_duration,
            ..Default::default()
        };
        let status = poll_until_complete(self.api.as_ref(), &handle, &options, &self.cancel).await?;

        let delivered = retrieve_outputs(Arc::clone(&self.api), &status, sink, &self.cancel).await?;
        tracing::info!(run_id = %handle.run_id, delivered, "ComfyDeploy run complete");
        Ok(())
    }
}
