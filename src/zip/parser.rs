//! Low-level ZIP archive parser.
//!
//! Reads the archive from the end, the way the format is meant to be read:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, follow the locator to the ZIP64 EOCD
//! 3. Read the Central Directory to get metadata for all entries
//! 4. For extraction, read the entry's Local File Header to find its data

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;

use super::error::ArchiveError;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// Bounds the backwards search for an EOCD followed by a comment. Signed
/// update packages always carry one.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser over any [`ReadAt`] source.
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
    /// Archive name used in error messages
    archive: String,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>, archive: impl Into<String>) -> Self {
        let size = reader.size();
        Self {
            reader,
            size,
            archive: archive.into(),
        }
    }

    pub fn archive_name(&self) -> &str {
        &self.archive
    }

    pub(crate) fn io_error(&self, source: io::Error) -> ArchiveError {
        ArchiveError::Io {
            archive: self.archive.clone(),
            source,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ArchiveError {
        ArchiveError::Malformed {
            archive: self.archive.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) async fn read_exact(&self, offset: u64, buf: &mut [u8]) -> Result<(), ArchiveError> {
        self.reader
            .read_exact_at(offset, buf)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64), ArchiveError> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(self.malformed("file too small"));
        }

        // Fast path: no trailing comment
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.read_exact(offset, &mut buf).await?;
        if let Some(eocd) = EndOfCentralDirectory::from_bytes(&buf).map_err(|e| self.io_error(e))? {
            if eocd.comment_len == 0 {
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let mut buf = vec![0u8; search_size as usize];
        self.read_exact(search_start, &mut buf).await?;

        // The comment length has to account for every byte after the record
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len != buf.len() - i - EndOfCentralDirectory::SIZE {
                continue;
            }
            if let Some(eocd) = EndOfCentralDirectory::from_bytes(&buf[i..])
                .map_err(|e| self.io_error(e))?
            {
                return Ok((eocd, search_start + i as u64));
            }
        }

        Err(self.malformed("end of central directory not found"))
    }

    /// Read the ZIP64 End of Central Directory record that precedes the
    /// regular EOCD at `eocd_offset`.
    pub async fn read_zip64_eocd(
        &self,
        eocd_offset: u64,
    ) -> Result<Zip64EndOfCentralDirectory, ArchiveError> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64Locator::SIZE as u64)
            .ok_or_else(|| self.malformed("missing ZIP64 locator"))?;
        let mut locator = vec![0u8; Zip64Locator::SIZE];
        self.read_exact(locator_offset, &mut locator).await?;
        let eocd64_offset = Zip64Locator::eocd64_offset(&locator)
            .map_err(|e| self.io_error(e))?
            .ok_or_else(|| self.malformed("invalid ZIP64 locator"))?;

        let mut record = vec![0u8; Zip64EndOfCentralDirectory::MIN_SIZE];
        self.read_exact(eocd64_offset, &mut record).await?;
        Zip64EndOfCentralDirectory::from_bytes(&record)
            .map_err(|e| self.io_error(e))?
            .ok_or_else(|| self.malformed("invalid ZIP64 end of central directory"))
    }

    /// List every entry of the central directory.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>, ArchiveError> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.saturating_add(cd_size) > self.size {
            return Err(self.malformed("central directory extends past end of file"));
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.read_exact(cd_offset, &mut cd_data).await?;

        // Every header is at least CDFH_MIN_SIZE bytes, which caps the count
        let max_entries = cd_data.len() / CDFH_MIN_SIZE;
        let mut entries = Vec::with_capacity((total_entries as usize).min(max_entries));
        let mut cursor = Cursor::new(cd_data.as_slice());
        for _ in 0..total_entries {
            let entry = self.parse_cdfh(&mut cursor)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    fn parse_cdfh(&self, cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry, ArchiveError> {
        let truncated = |_: io::Error| self.malformed("truncated central directory");

        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig).map_err(truncated)?;
        if sig != CDFH_SIGNATURE {
            return Err(self.malformed("invalid central directory file header"));
        }

        // version made by, version needed, flags
        cursor.set_position(cursor.position() + 6);
        let compression_method = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        // mod time, mod date
        cursor.set_position(cursor.position() + 4);
        let crc32 = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>().map_err(truncated)? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>().map_err(truncated)? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let extra_field_length = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let file_comment_length = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        // disk number start, internal and external attributes
        cursor.set_position(cursor.position() + 8);
        let mut lfh_offset = cursor.read_u32::<LittleEndian>().map_err(truncated)? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes).map_err(truncated)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
        let is_directory = file_name.ends_with('/');

        let extra_end = cursor.position() + extra_field_length as u64;
        while cursor.position() + 4 <= extra_end {
            let tag = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
            let field_size = cursor.read_u16::<LittleEndian>().map_err(truncated)? as u64;
            let field_end = (cursor.position() + field_size).min(extra_end);

            if tag == ZIP64_EXTRA_TAG {
                // Only saturated header fields are present, in this order
                if uncompressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
                }
                if compressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
                }
                if lfh_offset == 0xFFFF_FFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
                }
            }
            cursor.set_position(field_end);
        }

        cursor.set_position(extra_end + file_comment_length as u64);

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            is_directory,
        })
    }

    /// Offset of the first data byte of `entry`.
    ///
    /// The local header's name and extra lengths may differ from the central
    /// directory copy, so they are read from the local header itself.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64, ArchiveError> {
        let mut lfh = [0u8; LFH_SIZE];
        self.read_exact(entry.lfh_offset, &mut lfh).await?;
        if &lfh[0..4] != LFH_SIGNATURE {
            return Err(self.malformed(format!(
                "invalid local file header for {}",
                entry.file_name
            )));
        }

        let file_name_length = u16::from_le_bytes([lfh[26], lfh[27]]) as u64;
        let extra_field_length = u16::from_le_bytes([lfh[28], lfh[29]]) as u64;
        let data_offset = entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset.saturating_add(entry.compressed_size) > self.size {
            return Err(self.malformed(format!(
                "data for {} extends past end of file",
                entry.file_name
            )));
        }
        Ok(data_offset)
    }
}
