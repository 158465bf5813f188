//! In-memory ZIP writer for tests.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use std::io::Write;

use super::structures::{CDFH_SIGNATURE, EndOfCentralDirectory, LFH_SIGNATURE};

struct Entry {
    name: String,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    data: Vec<u8>,
}

#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
    comment: Vec<u8>,
}

fn crc_of(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.with_method(name, data, 0)
    }

    /// Store `data` raw but label it with `method`.
    pub fn with_method(mut self, name: &str, data: &[u8], method: u16) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            method,
            crc32: crc_of(data),
            uncompressed_size: data.len() as u32,
            data: data.to_vec(),
        });
        self
    }

    pub fn stored_with_bad_crc(mut self, name: &str, data: &[u8]) -> Self {
        self = self.stored(name, data);
        if let Some(last) = self.entries.last_mut() {
            last.crc32 ^= 0xDEAD_BEEF;
        }
        self
    }

    pub fn deflated(mut self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        self.entries.push(Entry {
            name: name.to_string(),
            method: 8,
            crc32: crc_of(data),
            uncompressed_size: data.len() as u32,
            data: encoder.finish().unwrap(),
        });
        self
    }

    /// Trailing archive comment, as signed OTA packages carry.
    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for e in &self.entries {
            offsets.push(out.len() as u32);
            out.extend_from_slice(LFH_SIGNATURE);
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(e.method).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap(); // time, date
            out.write_u32::<LittleEndian>(e.crc32).unwrap();
            out.write_u32::<LittleEndian>(e.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(e.uncompressed_size).unwrap();
            out.write_u16::<LittleEndian>(e.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(e.name.as_bytes());
            out.extend_from_slice(&e.data);
        }

        let cd_offset = out.len() as u32;
        for (e, offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(CDFH_SIGNATURE);
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(e.method).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(e.crc32).unwrap();
            out.write_u32::<LittleEndian>(e.data.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(e.uncompressed_size).unwrap();
            out.write_u16::<LittleEndian>(e.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap(); // extra
            out.write_u16::<LittleEndian>(0).unwrap(); // comment
            out.write_u16::<LittleEndian>(0).unwrap(); // disk
            out.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
            out.write_u32::<LittleEndian>(0).unwrap(); // external attrs
            out.write_u32::<LittleEndian>(*offset).unwrap();
            out.extend_from_slice(e.name.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.entries.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(self.entries.len() as u16).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);
        out
    }
}
