use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::verify::VerificationError;
use crate::zip::ArchiveError;

/// Errors that abort an import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an import is already running")]
    Busy,

    #[error("no async runtime to run the import on")]
    NoRuntime,

    #[error("failed to open {name}")]
    ResourceOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {name} to {}", .dest.display())]
    Copy {
        name: String,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("failed to register the imported update")]
    Register(#[source] anyhow::Error),

    #[error("failed to request installation of the imported update")]
    Install(#[source] anyhow::Error),

    #[error("import was cancelled")]
    Cancelled,

    #[error("import worker panicked")]
    WorkerPanicked,
}

impl ImportError {
    /// True when the import stopped because it was asked to.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ImportError::Cancelled | ImportError::Verification(VerificationError::Cancelled { .. })
        )
    }
}

/// Why the build timestamp could not be read. Never fatal: the importer
/// falls back to the current time.
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl TimestampError {
    /// True when the manifest or its timestamp line is absent, as opposed to
    /// present but unreadable.
    pub fn is_missing(&self) -> bool {
        match self {
            TimestampError::Archive(e) => e.is_not_found(),
            TimestampError::Metadata(e) => matches!(e, MetadataError::KeyNotFound { .. }),
        }
    }
}
