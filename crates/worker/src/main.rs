//! `comfydeploy-worker` -- run one generation on ComfyDeploy.
//!
//! Loads backend settings and the generation request from the
//! environment (see [`DeploySettings::from_env`] and
//! [`comfydeploy_worker::request`]), streams every produced asset into
//! `OUTPUT_DIR`, then shuts the backend down.  Ctrl-C cancels polling
//! and downloads in flight.
//!
//! | Variable     | Required | Default   |
//! |--------------|----------|-----------|
//! | `OUTPUT_DIR` | no       | `output`  |

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comfydeploy_backend::backend::{ComfyDeployBackend, BACKEND_TYPE};
use comfydeploy_backend::config::DeploySettings;
use comfydeploy_worker::model::select_model;
use comfydeploy_worker::output::FileSink;
use comfydeploy_worker::request::request_from_env;

const DEFAULT_OUTPUT_DIR: &str = "output";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comfydeploy_worker=info,comfydeploy_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = DeploySettings::from_env().context("invalid ComfyDeploy settings")?;
    let request = request_from_env().context("invalid generation request")?;
    tracing::info!(backend = BACKEND_TYPE.name, ?settings, "Loaded configuration");

    let output_dir = std::env::var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.into());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create output directory {output_dir}"))?;

    // --- Global cancellation ---
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            ctrl_c_cancel.cancel();
        }
    });

    let backend = ComfyDeployBackend::new(settings, cancel);
    backend.init().await?;

    if let Some(model) = request.model.as_deref() {
        if let Err(e) = select_model(&backend, model).await {
            backend.shutdown().await;
            return Err(e);
        }
    }

    let mut sink = FileSink::new(&output_dir, "comfydeploy");
    let result = backend.generate_live(&request, &mut sink).await;
    backend.shutdown().await;
    result?;

    let saved = sink.finish()?;
    tracing::info!(saved, dir = %sink.dir().display(), "Generation finished");
    Ok(())
}
