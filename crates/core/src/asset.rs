//! Decoded output assets and filename-based format detection.

use serde::Serialize;

/// Format used when an output filename carries no extension.
pub const DEFAULT_FORMAT: &str = "png";

/// Extensions treated as video containers.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi", "gif"];

/// What kind of asset a download produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    /// Classify an asset by its (lowercase or mixed-case) extension.
    pub fn from_format(format: &str) -> Self {
        if VIDEO_EXTENSIONS
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(format))
        {
            AssetKind::Video
        } else {
            AssetKind::Image
        }
    }
}

/// One downloaded output, handed to the host's sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    /// File extension without the leading dot, e.g. `png`.
    pub format: String,
    pub kind: AssetKind,
}

impl DecodedImage {
    pub fn new(bytes: Vec<u8>, format: String) -> Self {
        let kind = AssetKind::from_format(&format);
        Self {
            bytes,
            format,
            kind,
        }
    }
}

/// Derive the file extension from an output filename.
///
/// Takes the text after the last `.`; falls back to [`DEFAULT_FORMAT`]
/// when there is no dot or the suffix is blank.
pub fn extension_from_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.trim().is_empty() => ext.to_string(),
        _ => DEFAULT_FORMAT.to_string(),
    }
}
