//! Whole-file compression of fetched objects.
//!
//! S3 inventory shards are usually written as `*.csv.gz`; plain files pass
//! through untouched.

use std::io::Read;

use flate2::read::MultiGzDecoder;

use crate::error::DecodeError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression wrapping a fetched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// No compression (passthrough)
    #[default]
    Null,
    /// gzip, possibly several concatenated members
    Gzip,
}

impl Codec {
    /// Detect the codec from the magic bytes, falling back to the extension.
    pub fn detect(name: &str, data: &[u8]) -> Self {
        if data.starts_with(&GZIP_MAGIC) || name.to_ascii_lowercase().ends_with(".gz") {
            Codec::Gzip
        } else {
            Codec::Null
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Gzip => "gzip",
        }
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            Codec::Gzip => decompress_gzip(data),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut decoder = MultiGzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::Decompression(format!("gzip decompression failed: {}", e)))?;

    Ok(decompressed)
}

/// Decompress `data` if `name` or its magic bytes say it is compressed.
pub fn decompress_file(name: &str, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Codec::detect(name, data).decompress(data)
}
