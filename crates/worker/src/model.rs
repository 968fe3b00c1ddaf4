//! Model selection before a run.

use comfydeploy_backend::backend::ComfyDeployBackend;

/// Select `model` on `backend`, failing when the backend reports it
/// unavailable.
pub async fn select_model(backend: &ComfyDeployBackend, model: &str) -> anyhow::Result<()> {
    let available = backend.load_model(model).await?;
    anyhow::ensure!(available, "model {model} is not available on the ComfyDeploy machine");
    Ok(())
}
