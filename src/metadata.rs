//! OTA metadata manifest parsing.
//!
//! Update packages carry `META-INF/com/android/metadata`, a `key=value` text
//! file. Only the build timestamp is needed to describe a local import.

use std::collections::BTreeMap;
use std::num::ParseIntError;
use thiserror::Error;

/// Path of the manifest entry inside an update package
pub const METADATA_PATH: &str = "META-INF/com/android/metadata";

/// Manifest line prefix carrying the build time in epoch milliseconds
pub const TIMESTAMP_KEY: &str = "post-timestamp=";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no line starting with {key:?} in metadata")]
    KeyNotFound { key: &'static str },

    #[error("timestamp {value:?} is not a base-10 integer")]
    Malformed {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Extract the build timestamp (epoch millis) from manifest text.
///
/// Only the first matching line counts, even if it is malformed.
pub fn extract_timestamp(manifest: &str) -> Result<i64, MetadataError> {
    let value = manifest
        .split('\n')
        .find_map(|line| line.strip_prefix(TIMESTAMP_KEY))
        .ok_or(MetadataError::KeyNotFound { key: TIMESTAMP_KEY })?;

    let value = value.strip_suffix('\r').unwrap_or(value);
    value.parse::<i64>().map_err(|source| MetadataError::Malformed {
        value: value.to_string(),
        source,
    })
}

/// Every `key=value` pair in the manifest, in key order.
///
/// Lines without `=` are skipped; later duplicates win.
pub fn parse_properties(manifest: &str) -> BTreeMap<String, String> {
    manifest
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
