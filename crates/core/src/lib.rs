//! Shared domain types for the ComfyDeploy generation backend.
//!
//! Holds the host-facing request and asset types, the capability set a
//! backend advertises, and the workflow builder seam that turns a
//! request into a ComfyUI API graph.

pub mod asset;
pub mod error;
pub mod request;
pub mod workflow;
