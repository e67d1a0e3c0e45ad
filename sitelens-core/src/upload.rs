//! Upload gate: validates candidate media before it replaces pipeline state.
//!
//! Validation is pure. Nothing here touches orchestrator state, so a rejected
//! file leaves the previous asset, stages and logs exactly as they were.

use crate::error::{Error, Result};
use crate::types::{MediaAsset, MimeCategory};
use std::path::Path;
use std::sync::Arc;

/// Largest accepted asset (100 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Accepted MIME types
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/wmv",
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
];

const INVALID_TYPE_MESSAGE: &str = "Please select a valid video or image file";
const TOO_LARGE_MESSAGE: &str = "File size must be less than 100MB";

/// A file offered for upload, not yet validated
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub display_name: String,
    pub mime_type: String,
    pub payload: Vec<u8>,
}

impl CandidateFile {
    pub fn new(
        display_name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            mime_type: mime_type.into(),
            payload,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Read a candidate from disk, guessing the MIME type from the extension.
    ///
    /// Type and size are checked before the payload is read, so oversized
    /// files are rejected without loading them.
    pub fn from_path(path: &Path) -> Result<Self> {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        let size_bytes = std::fs::metadata(path)?.len();
        check_constraints(&mime_type, size_bytes)?;

        let payload = std::fs::read(path)?;
        Ok(Self {
            display_name,
            mime_type,
            payload,
        })
    }
}

/// Map platform MIME aliases onto the allow-list spelling
pub fn normalize_mime(mime_type: &str) -> String {
    let lower = mime_type.trim().to_ascii_lowercase();
    match lower.as_str() {
        "video/quicktime" => "video/mov".to_string(),
        "video/x-msvideo" | "video/msvideo" => "video/avi".to_string(),
        "video/x-ms-wmv" => "video/wmv".to_string(),
        _ => lower,
    }
}

fn check_constraints(mime_type: &str, size_bytes: u64) -> Result<String> {
    let normalized = normalize_mime(mime_type);
    if !ALLOWED_MIME_TYPES.contains(&normalized.as_str()) {
        return Err(Error::Validation(INVALID_TYPE_MESSAGE.to_string()));
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(Error::Validation(TOO_LARGE_MESSAGE.to_string()));
    }
    Ok(normalized)
}

/// Validate a candidate and turn it into an immutable asset
pub fn validate(candidate: CandidateFile) -> Result<MediaAsset> {
    let size_bytes = candidate.size_bytes();
    let mime_type = check_constraints(&candidate.mime_type, size_bytes)?;

    Ok(MediaAsset {
        category: MimeCategory::from_mime(&mime_type),
        mime_type,
        size_bytes,
        display_name: candidate.display_name,
        payload: Arc::from(candidate.payload),
    })
}
