//! Generation requests and backend capability sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Feature flags
// ---------------------------------------------------------------------------

/// Core ComfyUI graph support.
pub const FEATURE_COMFYUI: &str = "comfyui";
/// Refiner model stages.
pub const FEATURE_REFINERS: &str = "refiners";
/// ControlNet conditioning.
pub const FEATURE_CONTROLNET: &str = "controlnet";
/// Ending sampling before the final step.
pub const FEATURE_END_STEPS_EARLY: &str = "endstepsearly";
/// Seamless (tiling) generation.
pub const FEATURE_SEAMLESS: &str = "seamless";
/// Video outputs.
pub const FEATURE_VIDEO: &str = "video";
/// Variation seeds.
pub const FEATURE_VARIATION_SEED: &str = "variation_seed";
/// FreeU model patching.
pub const FEATURE_FREEU: &str = "freeu";
/// YOLOv8 detection / segmentation.
pub const FEATURE_YOLOV8: &str = "yolov8";

/// Features a ComfyDeploy backend advertises out of the box.
pub const DEFAULT_FEATURES: &[&str] = &[
    FEATURE_COMFYUI,
    FEATURE_REFINERS,
    FEATURE_CONTROLNET,
    FEATURE_END_STEPS_EARLY,
    FEATURE_SEAMLESS,
    FEATURE_VIDEO,
    FEATURE_VARIATION_SEED,
    FEATURE_FREEU,
    FEATURE_YOLOV8,
];

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 1024;
pub const DEFAULT_STEPS: u32 = 20;
pub const DEFAULT_CFG_SCALE: f64 = 7.0;
pub const DEFAULT_SAMPLER: &str = "euler";
pub const DEFAULT_SCHEDULER: &str = "normal";

/// The set of optional feature flags a backend instance supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(features.into_iter().map(Into::into).collect())
    }

    /// Whether `feature` is advertised by this set.
    pub fn supports(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the first feature in `required` this set does not support.
    pub fn first_missing<'a>(&self, required: &'a [String]) -> Option<&'a str> {
        required
            .iter()
            .map(String::as_str)
            .find(|f| !self.supports(f))
    }
}

impl FromIterator<String> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parameters for one generation call, owned by the host.
///
/// The core reads these to build a workflow and never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    /// Random seed; `None` lets the builder pick one.
    #[serde(default)]
    pub seed: Option<u64>,
    pub sampler: String,
    pub scheduler: String,
    /// Checkpoint filename on the remote machine.
    #[serde(default)]
    pub model: Option<String>,
    /// Number of images per run.
    pub batch_size: u32,
    /// Features the request relies on; each must be in the backend's set.
    #[serde(default)]
    pub required_features: Vec<String>,
    /// Free-form parameters a custom workflow builder may interpret.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationRequest {
    /// A request for `prompt` with every other parameter at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            steps: DEFAULT_STEPS,
            cfg_scale: DEFAULT_CFG_SCALE,
            seed: None,
            sampler: DEFAULT_SAMPLER.to_string(),
            scheduler: DEFAULT_SCHEDULER.to_string(),
            model: None,
            batch_size: 1,
            required_features: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}
