use crate::error::SparseError;
use std::str::FromStr;

/// Default read size for both pipelines.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// How the decoder realises long zero runs on its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleMode {
    /// Seek on regular files, zero-fill on anything else.
    Auto,
    Seek,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    CRC32,
    SHA256,
}

#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub chunk_size: usize,
    pub hole_mode: HoleMode,
    pub checksum: ChecksumType,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hole_mode: HoleMode::Auto,
            checksum: ChecksumType::CRC32,
        }
    }
}

impl CodecConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_hole_mode(mut self, hole_mode: HoleMode) -> Self {
        self.hole_mode = hole_mode;
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumType) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn validate(&self) -> Result<(), SparseError> {
        if self.chunk_size == 0 {
            return Err(SparseError::ConfigError("Chunk size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

impl FromStr for HoleMode {
    type Err = SparseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(HoleMode::Auto),
            "seek" => Ok(HoleMode::Seek),
            "fill" => Ok(HoleMode::Fill),
            _ => Err(SparseError::ConfigError(format!("Invalid hole mode: {}", s))),
        }
    }
}

impl FromStr for ChecksumType {
    type Err = SparseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crc32" => Ok(ChecksumType::CRC32),
            "sha256" => Ok(ChecksumType::SHA256),
            _ => Err(SparseError::ConfigError(format!("Invalid checksum type: {}", s))),
        }
    }
}
