//! File metadata extraction for change tracking
//!
//! The cache records a content hash, byte size and modification time for
//! every synced file so callers can tell whether a file needs re-parsing.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Observed state of a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hex-encoded SHA-256 of the file contents
    pub content_hash: String,
    pub file_size: u64,
    pub last_modified: DateTime<Utc>,
}

impl FileMetadata {
    /// Read metadata for `path`
    ///
    /// Returns `None` if the file is missing or unreadable. Extraction never
    /// fails loudly; the caller decides whether a missing file matters.
    pub fn extract(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let bytes = fs::read(path).ok()?;

        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
            .unwrap_or_default();

        Some(Self {
            content_hash: compute_hash(&bytes),
            file_size: bytes.len() as u64,
            last_modified,
        })
    }
}

/// Compute SHA256 hash of content
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
