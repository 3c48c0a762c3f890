//! Entry compression for save containers.
//!
//! Provides the ZIP compression methods the world entry may use:
//! - Stored (method 0), copied as-is
//! - Deflate (method 8), raw deflate streams via `flate2`
//! - Configurable compression levels
//!
//! # Example
//!
//! ```
//! use timber_save::compression::{CompressionLevel, EntryCompression};
//!
//! let data = br#"{"Singletons":{}}"#.repeat(20);
//! let packed = EntryCompression::Deflate
//!     .compress(&data, CompressionLevel::Fast)
//!     .unwrap();
//! let unpacked = EntryCompression::Deflate.decompress(&packed, data.len()).unwrap();
//! assert_eq!(data, unpacked);
//! ```

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use timber_common::{TimberError, TimberResult};

/// Largest inflated entry we are willing to materialize (512 MiB).
pub const MAX_ENTRY_SIZE: usize = 512 * 1024 * 1024;

/// Compression method of a container entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EntryCompression {
    /// No compression.
    Stored = 0,
    /// Raw deflate.
    Deflate = 8,
}

impl EntryCompression {
    /// Convert from the ZIP method field.
    #[must_use]
    pub fn from_method(method: u16) -> Option<Self> {
        match method {
            0 => Some(Self::Stored),
            8 => Some(Self::Deflate),
            _ => None,
        }
    }

    /// ZIP method field value.
    #[must_use]
    pub const fn method(self) -> u16 {
        self as u16
    }

    /// Get display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Stored => "Stored",
            Self::Deflate => "Deflate",
        }
    }

    /// Compress data.
    pub fn compress(self, data: &[u8], level: CompressionLevel) -> TimberResult<Vec<u8>> {
        match self {
            Self::Stored => Ok(data.to_vec()),
            Self::Deflate => {
                let mut encoder =
                    DeflateEncoder::new(Vec::with_capacity(data.len() / 2), level.flate2());
                encoder
                    .write_all(data)
                    .map_err(|e| TimberError::Format(format!("deflate failed: {e}")))?;
                encoder
                    .finish()
                    .map_err(|e| TimberError::Format(format!("deflate failed: {e}")))
            },
        }
    }

    /// Decompress data, expecting `expected_size` bytes of output.
    pub fn decompress(self, data: &[u8], expected_size: usize) -> TimberResult<Vec<u8>> {
        if expected_size > MAX_ENTRY_SIZE {
            return Err(TimberError::Format(format!(
                "entry of {expected_size} bytes exceeds the {MAX_ENTRY_SIZE} byte limit"
            )));
        }

        match self {
            Self::Stored => Ok(data.to_vec()),
            Self::Deflate => {
                let mut out = Vec::with_capacity(expected_size);
                DeflateDecoder::new(data)
                    .take(MAX_ENTRY_SIZE as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| TimberError::Format(format!("inflate failed: {e}")))?;
                Ok(out)
            },
        }
    }
}

/// Compression level preset used when an entry has to be re-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Fastest compression, lowest ratio.
    Fast,
    /// Balanced speed and ratio.
    #[default]
    Normal,
    /// Best compression, slower.
    Best,
}

impl CompressionLevel {
    /// Get the matching `flate2` level.
    #[must_use]
    pub fn flate2(self) -> Compression {
        match self {
            Self::Fast => Compression::fast(),
            Self::Normal => Compression::default(),
            Self::Best => Compression::best(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(EntryCompression::from_method(0), Some(EntryCompression::Stored));
        assert_eq!(EntryCompression::from_method(8), Some(EntryCompression::Deflate));
        assert_eq!(EntryCompression::from_method(12), None);
        assert_eq!(EntryCompression::Deflate.method(), 8);
        assert_eq!(EntryCompression::Stored.name(), "Stored");
    }

    #[test]
    fn test_deflate_shrinks_repetitive_data() {
        let data = b"0.5 0.5 0.5 0.5 ".repeat(512);
        for level in [
            CompressionLevel::Fast,
            CompressionLevel::Normal,
            CompressionLevel::Best,
        ] {
            let packed = EntryCompression::Deflate
                .compress(&data, level)
                .expect("compress");
            assert!(packed.len() < data.len() / 4);
            let unpacked = EntryCompression::Deflate
                .decompress(&packed, data.len())
                .expect("decompress");
            assert_eq!(unpacked, data);
        }
    }

    #[test]
    fn test_stored_is_identity() {
        let data = vec![7u8; 100];
        let packed = EntryCompression::Stored
            .compress(&data, CompressionLevel::Best)
            .expect("compress");
        assert_eq!(packed, data);
    }

    #[test]
    fn test_inflate_garbage_fails() {
        let result = EntryCompression::Deflate.decompress(&[0xFF, 0xFF, 0xFF, 0xFF], 10);
        assert!(matches!(result, Err(TimberError::Format(_))));
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let result = EntryCompression::Stored.decompress(&[], MAX_ENTRY_SIZE + 1);
        assert!(result.is_err());
    }
}
