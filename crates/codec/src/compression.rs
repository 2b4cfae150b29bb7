//! Gzip compression with a decompression bomb guard

use datavault_core::{Error, Result, DEFAULT_COMPRESSION_LEVEL, MAX_DECOMPRESSED_SIZE};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// A reversible byte transform applied to encoded payloads
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Reverse `compress`; output over the configured cap is `DecompressionBomb`
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Largest output `decompress` will produce
    fn max_decompressed(&self) -> u64;
}

/// Gzip codec configuration
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    /// Compression level (0-9)
    level: u32,
    /// Maximum number of bytes a decompression may produce
    max_decompressed: u64,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: DEFAULT_COMPRESSION_LEVEL,
            max_decompressed: MAX_DECOMPRESSED_SIZE,
        }
    }
}

impl GzipCodec {
    pub fn new(level: u32, max_decompressed: u64) -> Result<Self> {
        if level > 9 {
            return Err(Error::configuration(format!(
                "gzip level must be between 0 and 9, got {level}"
            )));
        }
        Ok(Self {
            level,
            max_decompressed,
        })
    }

    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub const fn max_decompressed(&self) -> u64 {
        self.max_decompressed
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 4),
            Compression::new(self.level),
        );
        encoder
            .write_all(data)
            .map_err(|e| Error::encoding("compress", e))?;
        encoder.finish().map_err(|e| Error::encoding("compress", e))
    }

    /// Decompress, never producing or allocating more than the cap.
    ///
    /// Output that would exceed the cap yields `DecompressionBomb`.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let decoder = GzDecoder::new(data);
        // One byte past the cap is enough to tell "exactly at" from "over"
        let mut limited = decoder.take(self.max_decompressed.saturating_add(1));
        let mut out = Vec::new();
        limited
            .read_to_end(&mut out)
            .map_err(|e| Error::decoding("decompress", e))?;

        if out.len() as u64 > self.max_decompressed {
            tracing::error!(
                limit = self.max_decompressed,
                compressed_size = data.len(),
                "Decompressed data exceeds limit, possible decompression bomb"
            );
            return Err(Error::decompression_bomb(self.max_decompressed));
        }
        Ok(out)
    }
}

impl Compressor for GzipCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        GzipCodec::compress(self, data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        GzipCodec::decompress(self, data)
    }

    fn max_decompressed(&self) -> u64 {
        self.max_decompressed
    }
}

/// Byte sizes observed while encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
}

impl CompressionStats {
    /// Original size divided by compressed size; zero when nothing was written
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_roundtrip() {
        let codec = GzipCodec::default();
        let data = b"the quick brown fox ".repeat(100);
        let compressed = codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            GzipCodec::new(10, 1024),
            Err(Error::Configuration { .. })
        ));
        assert!(GzipCodec::new(0, 1024).is_ok());
    }

    #[test]
    fn test_decompression_bomb_rejected() {
        let codec = GzipCodec::new(9, 1024).unwrap();
        // 1 MiB of zeros compresses to around a kilobyte
        let bomb = codec.compress(&vec![0u8; 1024 * 1024]).unwrap();

        let err = codec.decompress(&bomb).unwrap_err();
        assert!(matches!(err, Error::DecompressionBomb { limit: 1024 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_output_exactly_at_cap_is_accepted() {
        let codec = GzipCodec::new(6, 4096).unwrap();
        let data = vec![7u8; 4096];
        let compressed = codec.compress(&data).unwrap();
        assert_eq!(codec.decompress(&compressed).unwrap().len(), 4096);
    }

    #[test]
    fn test_garbage_is_decoding_failure() {
        let codec = GzipCodec::default();
        let err = codec.decompress(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, Error::DecodingFailure { stage: "decompress", .. }));
        assert!(err.is_fallback_recoverable());
    }

    #[test]
    fn test_ratio() {
        let stats = CompressionStats {
            original_size: 1000,
            compressed_size: 250,
        };
        assert!((stats.ratio() - 4.0).abs() < f64::EPSILON);
        let empty = CompressionStats {
            original_size: 0,
            compressed_size: 0,
        };
        assert_eq!(empty.ratio(), 0.0);
    }
}
