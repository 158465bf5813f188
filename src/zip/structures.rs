use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Decode an EOCD record. Returns `None` when the signature does not match.
    pub fn from_bytes(data: &[u8]) -> io::Result<Option<Self>> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Ok(None);
        }

        // Skip disk number, disk with CD and per-disk entry count
        let mut cursor = Cursor::new(&data[10..]);
        Ok(Some(Self {
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        }))
    }

    pub fn is_zip64(&self) -> bool {
        self.total_entries == 0xFFFF || self.cd_size == 0xFFFF_FFFF || self.cd_offset == 0xFFFF_FFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64Locator;

impl Zip64Locator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    /// Offset of the ZIP64 EOCD record, if `data` is a locator.
    pub fn eocd64_offset(data: &[u8]) -> io::Result<Option<u64>> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Ok(None);
        }
        let mut cursor = Cursor::new(&data[8..]);
        Ok(Some(cursor.read_u64::<LittleEndian>()?))
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, Copy)]
pub struct Zip64EndOfCentralDirectory {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> io::Result<Option<Self>> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Ok(None);
        }

        // Entry counts start after size, versions and disk numbers
        let mut cursor = Cursor::new(&data[32..]);
        Ok(Some(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        }))
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Extra field tag carrying 64-bit sizes and offsets
pub const ZIP64_EXTRA_TAG: u16 = 0x0001;

/// One entry of the central directory
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub is_directory: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eocd_with_wrong_signature_is_not_an_eocd() {
        let data = [0u8; EndOfCentralDirectory::SIZE];
        assert!(EndOfCentralDirectory::from_bytes(&data).unwrap().is_none());
    }

    #[test]
    fn eocd_decodes_directory_location() {
        let mut data = Vec::from(EndOfCentralDirectory::SIGNATURE);
        data.extend_from_slice(&[0, 0, 0, 0, 3, 0]);
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&138u32.to_le_bytes());
        data.extend_from_slice(&512u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let eocd = EndOfCentralDirectory::from_bytes(&data).unwrap().unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 138);
        assert_eq!(eocd.cd_offset, 512);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn saturated_offset_means_zip64() {
        let eocd = EndOfCentralDirectory {
            total_entries: 1,
            cd_size: 10,
            cd_offset: 0xFFFF_FFFF,
            comment_len: 0,
        };
        assert!(eocd.is_zip64());
    }

    #[test]
    fn unknown_compression_keeps_its_code() {
        assert_eq!(CompressionMethod::from_u16(14), CompressionMethod::Unknown(14));
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
    }
}
