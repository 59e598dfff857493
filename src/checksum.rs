//! CRC32 and SHA-256 digests of decoded content.

use crate::config::ChecksumType;
use crc32fast::Hasher as Crc32Hasher;
use sha2::{Digest, Sha256};
use std::fmt;

/// Incremental hasher over either supported checksum.
#[derive(Clone)]
pub enum Checksummer {
    Crc32(Crc32Hasher),
    Sha256(Sha256),
}

impl Checksummer {
    pub fn new(checksum_type: ChecksumType) -> Self {
        match checksum_type {
            ChecksumType::CRC32 => Checksummer::Crc32(Crc32Hasher::new()),
            ChecksumType::SHA256 => Checksummer::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Checksummer::Crc32(hasher) => hasher.update(data),
            Checksummer::Sha256(hasher) => hasher.update(data),
        }
    }

    pub fn finalize(self) -> ChecksumResult {
        match self {
            Checksummer::Crc32(hasher) => ChecksumResult::Crc32(hasher.finalize()),
            Checksummer::Sha256(hasher) => ChecksumResult::Sha256(hasher.finalize().into()),
        }
    }
}

impl fmt::Debug for Checksummer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checksummer::Crc32(_) => f.write_str("Checksummer::Crc32"),
            Checksummer::Sha256(_) => f.write_str("Checksummer::Sha256"),
        }
    }
}

/// Result of a checksum calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumResult {
    Crc32(u32),
    Sha256([u8; 32]),
}

impl ChecksumResult {
    pub fn checksum_type(&self) -> ChecksumType {
        match self {
            ChecksumResult::Crc32(_) => ChecksumType::CRC32,
            ChecksumResult::Sha256(_) => ChecksumType::SHA256,
        }
    }
}

impl fmt::Display for ChecksumResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumResult::Crc32(crc) => write!(f, "{:08x}", crc),
            ChecksumResult::Sha256(hash) => hash.iter().try_for_each(|b| write!(f, "{:02x}", b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        let mut crc = Checksummer::new(ChecksumType::CRC32);
        crc.update(b"123456789");
        assert_eq!(crc.finalize().to_string(), "cbf43926");

        let mut sha = Checksummer::new(ChecksumType::SHA256);
        sha.update(b"abc");
        let digest = sha.finalize();
        assert_eq!(digest.checksum_type(), ChecksumType::SHA256);
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_split_updates_match_single_update() {
        let mut whole = Checksummer::new(ChecksumType::SHA256);
        whole.update(b"hello, sparse world");

        let mut parts = Checksummer::new(ChecksumType::SHA256);
        parts.update(b"hello, ");
        parts.update(b"sparse world");

        assert_eq!(whole.finalize(), parts.finalize());
    }
}
