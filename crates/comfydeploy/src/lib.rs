//! ComfyDeploy generation backend.
//!
//! Submits a ComfyUI workflow to the ComfyDeploy run API, polls the run
//! until it finishes, and downloads every produced asset concurrently.
//! [`backend::ComfyDeployBackend`] wraps the job driver in the
//! init / generate / shutdown lifecycle a host application expects.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod messages;
pub mod payload;
pub mod poller;
pub mod retriever;
pub mod sink;
pub mod submitter;

mod cancel;

#[cfg(test)]
pub(crate) mod test_support;
