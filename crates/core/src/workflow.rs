//! Workflow builder seam and the default text-to-image graph.
//!
//! A [`WorkflowBuilder`] turns a [`GenerationRequest`] into a ComfyUI
//! API-format workflow document (a JSON object keyed by node ID, each
//! node carrying `class_type` and `inputs`).  The document is returned
//! as text; callers parse it before sending it anywhere.

use serde_json::json;

use crate::error::CoreError;
use crate::request::{FeatureSet, GenerationRequest};

// ---------------------------------------------------------------------------
// ComfyUI node class types
// ---------------------------------------------------------------------------

const LOAD_CHECKPOINT_CLASS: &str = "CheckpointLoaderSimple";
const CLIP_TEXT_ENCODE_CLASS: &str = "CLIPTextEncode";
const EMPTY_LATENT_CLASS: &str = "EmptyLatentImage";
const KSAMPLER_CLASS: &str = "KSampler";
const VAE_DECODE_CLASS: &str = "VAEDecode";
const SAVE_IMAGE_CLASS: &str = "SaveImage";

/// Checkpoint used when the request names none.
pub const DEFAULT_CHECKPOINT: &str = "sd_xl_base_1.0.safetensors";

/// Filename prefix for images written by the save node.
pub const OUTPUT_PREFIX: &str = "ComfyDeploy";

/// Largest width or height accepted by the default builder.
pub const MAX_DIMENSION: u32 = 8192;

/// Builds the workflow document embedded in a job submission.
pub trait WorkflowBuilder: Send + Sync {
    /// Render `request` as a ComfyUI API workflow, shaped by the
    /// capabilities the backend advertises.
    fn build(&self, request: &GenerationRequest, features: &FeatureSet)
        -> Result<String, CoreError>;
}

/// Plain text-to-image graph: checkpoint -> CLIP encode -> KSampler ->
/// VAE decode -> save.
#[derive(Debug, Clone, Default)]
pub struct Txt2ImgWorkflowBuilder;

impl Txt2ImgWorkflowBuilder {
    fn validate(request: &GenerationRequest, features: &FeatureSet) -> Result<(), CoreError> {
        if request.prompt.trim().is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()));
        }
        if request.width == 0 || request.height == 0 {
            return Err(CoreError::Validation(format!(
                "dimensions must be positive, got {}x{}",
                request.width, request.height
            )));
        }
        if request.width > MAX_DIMENSION || request.height > MAX_DIMENSION {
            return Err(CoreError::Validation(format!(
                "dimensions must not exceed {MAX_DIMENSION}, got {}x{}",
                request.width, request.height
            )));
        }
        if request.batch_size == 0 {
            return Err(CoreError::Validation("batch_size must be at least 1".into()));
        }
        if let Some(missing) = features.first_missing(&request.required_features) {
            return Err(CoreError::UnsupportedFeature(missing.to_string()));
        }
        Ok(())
    }
}

impl WorkflowBuilder for Txt2ImgWorkflowBuilder {
    fn build(
        &self,
        request: &GenerationRequest,
        features: &FeatureSet,
    ) -> Result<String, CoreError> {
        Self::validate(request, features)?;

        let checkpoint = request.model.as_deref().unwrap_or(DEFAULT_CHECKPOINT);
        let seed = request.seed.unwrap_or_else(random_seed);

        let workflow = json!({
            "4": {
                "class_type": LOAD_CHECKPOINT_CLASS,
                "inputs": { "ckpt_name": checkpoint },
            },
            "5": {
                "class_type": EMPTY_LATENT_CLASS,
                "inputs": {
                    "width": request.width,
                    "height": request.height,
                    "batch_size": request.batch_size,
                },
            },
            "6": {
                "class_type": CLIP_TEXT_ENCODE_CLASS,
                "inputs": { "text": request.prompt, "clip": ["4", 1] },
            },
            "7": {
                "class_type": CLIP_TEXT_ENCODE_CLASS,
                "inputs": { "text": request.negative_prompt, "clip": ["4", 1] },
            },
            "3": {
                "class_type": KSAMPLER_CLASS,
                "inputs": {
                    "seed": seed,
                    "steps": request.steps,
                    "cfg": request.cfg_scale,
                    "sampler_name": request.sampler,
                    "scheduler": request.scheduler,
                    "denoise": 1.0,
                    "model": ["4", 0],
                    "positive": ["6", 0],
                    "negative": ["7", 0],
                    "latent_image": ["5", 0],
                },
            },
            "8": {
                "class_type": VAE_DECODE_CLASS,
                "inputs": { "samples": ["3", 0], "vae": ["4", 2] },
            },
            "9": {
                "class_type": SAVE_IMAGE_CLASS,
                "inputs": { "filename_prefix": OUTPUT_PREFIX, "images": ["8", 0] },
            },
        });

        serde_json::to_string(&workflow).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

/// Seed derived from the wall clock, for requests that leave it unset.
fn random_seed() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map(|n| n.unsigned_abs())
        .unwrap_or_default()
}
