//! # sparsify
//!
//! Carries sparse files through tools that only understand byte streams.
//!
//! Copy tools, pipes and archivers read a hole as a long run of zero bytes and
//! write it back out the same way, so a mostly-empty 10 GiB disk image costs
//! 10 GiB to move and 10 GiB to store on the other side. `sparsify` encodes
//! long zero runs as a short decimal count and, when decoding onto a regular
//! file, turns those counts back into holes by seeking instead of writing.
//!
//! ## Wire format
//!
//! There is no header. Nonzero bytes pass through unchanged. A run of `n`
//! zeros becomes `n + 1` zero bytes when `n < 1024`, and otherwise a zero
//! byte, the decimal digits of `n`, and another zero byte. See [`codec`].
//!
//! ## Quick Start
//!
//! ```rust
//! use sparsify::{decode_data, encode_data};
//!
//! let mut original = b"boot".to_vec();
//! original.extend(vec![0u8; 4096]);
//! original.extend_from_slice(b"data");
//!
//! let encoded = encode_data(&original).unwrap();
//! assert_eq!(encoded, b"boot\x004096\x00data");
//!
//! let decoded = decode_data(&encoded).unwrap();
//! assert_eq!(decoded, original);
//! ```
//!
//! ### Working with Files
//!
//! ```rust,no_run
//! use sparsify::{pipeline, CodecConfig, Counters};
//! use std::fs::File;
//! use std::io::{BufReader, BufWriter};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CodecConfig::default();
//! let mut counters = Counters::new();
//!
//! let mut reader = BufReader::new(File::open("disk.img.sparse")?);
//! let mut writer = BufWriter::new(File::create("disk.img")?);
//! let stats = pipeline::decode(&mut reader, &mut writer, &config, &mut counters)?;
//! println!("{} bytes restored as holes", stats.counters.hole_bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod cli;
pub mod codec;
pub mod config;
pub mod counters;
pub mod error;
pub mod pipeline;
pub mod sink;

pub use checksum::ChecksumResult;
pub use codec::{TokenTally, LONG_RUN_THRESHOLD};
pub use config::{ChecksumType, CodecConfig, HoleMode};
pub use counters::{CounterSnapshot, Counters, ProgressSignal};
pub use error::{Result, SparseError};
pub use pipeline::{decode, encode, inspect, CodecStats, StreamInfo};
pub use sink::{ChecksumSink, HoleSink, ZeroFillSink};

use std::io::Cursor;

/// Encode data in memory
///
/// For large inputs use the streaming [`pipeline::encode`] instead.
///
/// # Example
///
/// ```rust
/// use sparsify::encode_data;
///
/// let encoded = encode_data(b"AB\0\0\0\0\0CD").unwrap();
/// assert_eq!(encoded, b"AB\0\0\0\0\0\0CD");
/// ```
pub fn encode_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut input = Cursor::new(data);
    let mut output = Vec::new();

    pipeline::encode(&mut input, &mut output, &CodecConfig::default(), &mut Counters::new())?;
    Ok(output)
}

/// Decode data in memory
///
/// Holes are materialised as zero bytes in the returned buffer.
///
/// # Example
///
/// ```rust
/// use sparsify::decode_data;
///
/// let decoded = decode_data(b"x\x002000\x00").unwrap();
/// assert_eq!(decoded.len(), 2001);
/// assert!(decode_data(b"\x0012a3\x00").is_err());
/// ```
pub fn decode_data(encoded: &[u8]) -> Result<Vec<u8>> {
    let mut input = Cursor::new(encoded);
    let mut output = Cursor::new(Vec::new());

    pipeline::decode(&mut input, &mut output, &CodecConfig::default(), &mut Counters::new())?;
    Ok(output.into_inner())
}

/// Get information about an encoded stream
///
/// # Example
///
/// ```rust
/// use sparsify::{encode_data, stream_info, ChecksumType};
///
/// let encoded = encode_data(&vec![0u8; 1 << 20]).unwrap();
/// let info = stream_info(&encoded, ChecksumType::CRC32).unwrap();
/// assert_eq!(info.decoded_size, 1 << 20);
/// assert_eq!(info.hole_bytes, 1 << 20);
/// ```
pub fn stream_info(encoded: &[u8], checksum: ChecksumType) -> Result<StreamInfo> {
    let mut input = Cursor::new(encoded);
    pipeline::inspect(&mut input, &CodecConfig::default().with_checksum(checksum))
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get library version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: VERSION,
        authors: AUTHORS,
        description: DESCRIPTION,
    }
}

#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub version: &'static str,
    pub authors: &'static str,
    pub description: &'static str,
}
