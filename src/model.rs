//! Update records handed to the update registry.

use std::fmt;
use std::path::PathBuf;

/// Download id reserved for packages imported from local storage.
///
/// Server-provided updates use their own ids, so this never collides.
pub const LOCAL_ID: &str = "local";

/// Lifecycle state of an update in the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateStatus {
    #[default]
    Unknown,
    Starting,
    Downloading,
    Downloaded,
    Paused,
    PausedError,
    Deleted,
    Verifying,
    Verified,
    VerificationFailed,
    Installing,
    Installed,
    InstallationFailed,
    InstallationCancelled,
    InstallationSuspended,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateStatus::Unknown => "unknown",
            UpdateStatus::Starting => "starting",
            UpdateStatus::Downloading => "downloading",
            UpdateStatus::Downloaded => "downloaded",
            UpdateStatus::Paused => "paused",
            UpdateStatus::PausedError => "paused-error",
            UpdateStatus::Deleted => "deleted",
            UpdateStatus::Verifying => "verifying",
            UpdateStatus::Verified => "verified",
            UpdateStatus::VerificationFailed => "verification-failed",
            UpdateStatus::Installing => "installing",
            UpdateStatus::Installed => "installed",
            UpdateStatus::InstallationFailed => "installation-failed",
            UpdateStatus::InstallationCancelled => "installation-cancelled",
            UpdateStatus::InstallationSuspended => "installation-suspended",
        };
        f.write_str(s)
    }
}

/// Status that survives restarts of the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PersistentStatus {
    #[default]
    Unknown,
    Incomplete,
    Verified,
}

impl PersistentStatus {
    /// Stable code used when the status is stored.
    pub fn code(self) -> i32 {
        match self {
            PersistentStatus::Unknown => 0,
            PersistentStatus::Incomplete => 1,
            PersistentStatus::Verified => 2,
        }
    }
}

/// An update known to the updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub download_id: String,
    pub name: String,
    pub version: String,
    pub file: PathBuf,
    pub file_size: u64,
    /// Build time in epoch milliseconds
    pub timestamp: i64,
    pub status: UpdateStatus,
    pub persistent_status: PersistentStatus,
    /// True for updates listed by the update server
    pub available_online: bool,
}

impl UpdateRecord {
    /// Record for a package that was imported from local storage and has
    /// already passed verification.
    pub fn local_verified(
        name: String,
        version: String,
        file: PathBuf,
        file_size: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            download_id: LOCAL_ID.to_string(),
            name,
            version,
            file,
            file_size,
            timestamp,
            status: UpdateStatus::Verified,
            persistent_status: PersistentStatus::Verified,
            available_online: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_record_is_verified_and_offline() {
        let record = UpdateRecord::local_verified(
            "Local update".into(),
            "Local update (Nov 14, 2023)".into(),
            PathBuf::from("/data/updates/localUpdate.zip"),
            1024,
            1_700_000_000_000,
        );
        assert_eq!(record.download_id, LOCAL_ID);
        assert!(!record.available_online);
        assert_eq!(record.status, UpdateStatus::Verified);
        assert_eq!(record.persistent_status, PersistentStatus::Verified);
    }

    #[test]
    fn persistent_codes_are_stable() {
        assert_eq!(PersistentStatus::Unknown.code(), 0);
        assert_eq!(PersistentStatus::Incomplete.code(), 1);
        assert_eq!(PersistentStatus::Verified.code(), 2);
    }
}
