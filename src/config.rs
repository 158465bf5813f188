//! Importer settings.

use std::path::PathBuf;

use crate::metadata::METADATA_PATH;

/// Name of the managed copy; a new import always overwrites it.
pub const DEFAULT_FILE_NAME: &str = "localUpdate.zip";

/// Copy buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Directory holding downloaded and imported packages
    pub download_dir: PathBuf,
    pub file_name: String,
    pub buffer_size: usize,
    /// Manifest entry read for the build timestamp
    pub metadata_path: String,
}

impl ImporterConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            metadata_path: METADATA_PATH.to_string(),
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Fixed location of the imported package
    pub fn managed_file_path(&self) -> PathBuf {
        self.download_dir.join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_file_lives_in_download_dir() {
        let config = ImporterConfig::new("/data/updates");
        assert_eq!(
            config.managed_file_path(),
            PathBuf::from("/data/updates/localUpdate.zip")
        );
        assert_eq!(config.buffer_size, 4096);
    }

    #[test]
    fn zero_buffer_is_clamped() {
        assert_eq!(ImporterConfig::new("/tmp").with_buffer_size(0).buffer_size, 1);
    }
}
