//! `comfydeploy-worker` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod model;
pub mod output;
pub mod request;
