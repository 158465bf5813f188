//! ZIP archive reading.
//!
//! Just enough of the format to pull a single text entry (the OTA metadata
//! manifest) out of an update package without unpacking the payload.
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 EOCD, headers)
//! - [`parser`]: locating and decoding the central directory
//! - [`extractor`]: finding an entry by name and inflating it
//!
//! Supported: ZIP64, archive comments (signed packages always have one),
//! STORED and DEFLATE entries, CRC-32 validation. Not supported: encryption,
//! multi-disk archives, other compression methods.

mod error;
mod extractor;
mod parser;
mod structures;

#[cfg(test)]
pub(crate) mod fixture;

pub use error::ArchiveError;
pub use extractor::{MAX_ENTRY_SIZE, ZipExtractor, read_entry_to_string};
pub use parser::ZipParser;
pub use structures::*;
