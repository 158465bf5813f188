use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::io::{LocalFileReader, ReadAt};

use super::error::ArchiveError;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Largest entry [`ZipExtractor::extract_to_memory`] will inflate.
///
/// Manifests are a few hundred bytes; anything near this size is not one.
pub const MAX_ENTRY_SIZE: u64 = 4 * 1024 * 1024;

/// Reads single entries out of a ZIP archive.
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    cancel: CancellationToken,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>, archive: impl Into<String>) -> Self {
        Self {
            parser: ZipParser::new(reader, archive),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort between reads once `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn check_cancelled(&self) -> Result<(), ArchiveError> {
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled {
                archive: self.parser.archive_name().to_string(),
            });
        }
        Ok(())
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>, ArchiveError> {
        self.check_cancelled()?;
        self.parser.list_files().await
    }

    /// Find the entry whose name is exactly `path`.
    pub async fn find_entry(&self, path: &str) -> Result<ZipFileEntry, ArchiveError> {
        self.list_files()
            .await?
            .into_iter()
            .find(|e| e.file_name == path)
            .ok_or_else(|| ArchiveError::EntryNotFound {
                entry: path.to_string(),
                archive: self.parser.archive_name().to_string(),
            })
    }

    /// Inflate an entry into memory and check its CRC-32.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>, ArchiveError> {
        let archive = self.parser.archive_name();

        if entry.uncompressed_size > MAX_ENTRY_SIZE || entry.compressed_size > MAX_ENTRY_SIZE {
            return Err(ArchiveError::EntryTooLarge {
                entry: entry.file_name.clone(),
                archive: archive.to_string(),
                size: entry.uncompressed_size.max(entry.compressed_size),
                limit: MAX_ENTRY_SIZE,
            });
        }

        self.check_cancelled()?;
        let data_offset = self.parser.get_data_offset(entry).await?;
        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.read_exact(data_offset, &mut raw).await?;
        self.check_cancelled()?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(raw.as_slice())
                    .take(MAX_ENTRY_SIZE + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| self.parser.io_error(e))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(ArchiveError::UnsupportedCompression {
                    entry: entry.file_name.clone(),
                    archive: archive.to_string(),
                    method,
                });
            }
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if data.len() as u64 != entry.uncompressed_size || crc.sum() != entry.crc32 {
            return Err(ArchiveError::ChecksumMismatch {
                entry: entry.file_name.clone(),
                archive: archive.to_string(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }

        Ok(data)
    }

    /// Read the entry named `path` and decode it as UTF-8 text.
    ///
    /// Invalid sequences are replaced rather than rejected.
    pub async fn read_to_string(&self, path: &str) -> Result<String, ArchiveError> {
        let entry = self.find_entry(path).await?;
        let data = self.extract_to_memory(&entry).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

/// Open the archive at `path` and return the text of `entry`.
///
/// The archive handle is released before this returns, on every path.
pub async fn read_entry_to_string(
    path: &Path,
    entry: &str,
    cancel: &CancellationToken,
) -> Result<String, ArchiveError> {
    let archive = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let reader = LocalFileReader::open(path).await.map_err(|source| ArchiveError::Io {
        archive: archive.clone(),
        source,
    })?;

    ZipExtractor::new(Arc::new(reader), archive)
        .with_cancellation(cancel.clone())
        .read_to_string(entry)
        .await
}
