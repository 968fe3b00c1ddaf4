//! Sink that writes each delivered asset to a directory.

use std::path::{Path, PathBuf};

use comfydeploy_backend::sink::OutputSink;
use comfydeploy_core::asset::DecodedImage;

/// Writes assets as `<prefix>_<n>.<format>` in arrival order.
///
/// Write failures are logged and counted without interrupting the
/// generation; [`FileSink::finish`] turns them into an error afterwards.
pub struct FileSink {
    dir: PathBuf,
    prefix: String,
    written: Vec<PathBuf>,
    failures: usize,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            written: Vec::new(),
            failures: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in arrival order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Number of saved assets, or an error if any asset failed to save.
    pub fn finish(&self) -> anyhow::Result<usize> {
        anyhow::ensure!(
            self.failures == 0,
            "{} of {} outputs could not be saved to {}",
            self.failures,
            self.failures + self.written.len(),
            self.dir.display(),
        );
        Ok(self.written.len())
    }

    fn next_path(&self, format: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", self.prefix, self.written.len() + self.failures, format))
    }
}

impl OutputSink for FileSink {
    fn deliver(&mut self, asset: DecodedImage) {
        let path = self.next_path(&asset.format);
        match std::fs::write(&path, &asset.bytes) {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    size = asset.bytes.len(),
                    kind = ?asset.kind,
                    "Saved output",
                );
                self.written.push(path);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to save output");
                self.failures += 1;
            }
        }
    }
}
