use std::io;
use thiserror::Error;

/// Errors raised while reading an entry out of a ZIP archive.
///
/// Every variant names the archive so a log line is enough to tell which
/// package failed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("couldn't find {entry} in {archive}")]
    EntryNotFound { entry: String, archive: String },

    #[error("I/O error reading {archive}")]
    Io {
        archive: String,
        #[source]
        source: io::Error,
    },

    #[error("{archive} is not a valid ZIP file: {reason}")]
    Malformed { archive: String, reason: String },

    #[error("{entry} in {archive} uses unsupported compression method {method}")]
    UnsupportedCompression {
        entry: String,
        archive: String,
        method: u16,
    },

    #[error("{entry} in {archive} is {size} bytes, above the {limit} byte limit")]
    EntryTooLarge {
        entry: String,
        archive: String,
        size: u64,
        limit: u64,
    },

    #[error("CRC mismatch for {entry} in {archive}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        entry: String,
        archive: String,
        expected: u32,
        actual: u32,
    },

    #[error("reading {archive} was cancelled")]
    Cancelled { archive: String },
}

impl ArchiveError {
    /// True when the archive was readable but lacks the requested entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::EntryNotFound { .. })
    }
}
