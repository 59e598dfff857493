use crate::checksum::ChecksumResult;
use crate::codec::{DecodeCursor, TokenTally, ZeroRunEncoder};
use crate::config::CodecConfig;
use crate::counters::{CounterSnapshot, Counters};
use crate::error::SparseError;
use crate::sink::{ChecksumSink, HoleSink};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CodecStats {
	pub counters: CounterSnapshot,
	pub tokens: TokenTally,
	pub elapsed: Duration,
}

impl CodecStats {
	/// Output size over input size.
	pub fn ratio(&self) -> f64 {
		if self.counters.bytes_read > 0 { self.counters.bytes_written as f64 / self.counters.bytes_read as f64 } else { 0.0 }
	}
}

/// What an encoded stream decodes to, without materialising it.
#[derive(Debug, Clone)]
pub struct StreamInfo {
	pub encoded_size: u64,
	pub decoded_size: u64,
	pub hole_bytes: u64,
	pub tokens: TokenTally,
	pub checksum: ChecksumResult,
}

/// Reads up to `buffer.len()` bytes, retrying interrupted reads. Returns 0 at end of input.
fn read_chunk<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize, SparseError> {
	loop {
		match reader.read(buffer) {
			Ok(n) => return Ok(n),
			Err(e) if e.kind() == ErrorKind::Interrupted => continue,
			Err(e) => return Err(e.into()),
		}
	}
}

pub fn encode<R: Read, W: Write>(
	reader: &mut R,
	writer: &mut W,
	config: &CodecConfig,
	counters: &mut Counters,
) -> Result<CodecStats, SparseError> {
	config.validate()?;
	let start = Instant::now();
	log::debug!("encoding with {} byte chunks", config.chunk_size);

	let mut buffer = vec![0u8; config.chunk_size];
	let mut encoder = ZeroRunEncoder::new();
	loop {
		let n = read_chunk(reader, &mut buffer)?;
		if n == 0 { break; }
		counters.add_read(n as u64);
		log::trace!("encoding chunk of {} bytes", n);
		encoder.feed(&buffer[..n], writer, counters)?;
		counters.checkpoint()?;
	}

	let tokens = encoder.finish(writer, counters)?;
	writer.flush()?;
	counters.finish();

	let stats = CodecStats { counters: counters.snapshot(), tokens, elapsed: start.elapsed() };
	log::info!(
		"encoded {} bytes into {} bytes ({} tokens) in {:.2?}",
		stats.counters.bytes_read, stats.counters.bytes_written, stats.tokens.total(), stats.elapsed
	);
	Ok(stats)
}

pub fn decode<R: Read, S: HoleSink>(
	reader: &mut R,
	sink: &mut S,
	config: &CodecConfig,
	counters: &mut Counters,
) -> Result<CodecStats, SparseError> {
	config.validate()?;
	let start = Instant::now();
	log::debug!("decoding with {} byte chunks", config.chunk_size);

	let mut buffer = vec![0u8; config.chunk_size];
	let mut cursor = DecodeCursor::new();
	loop {
		let n = read_chunk(reader, &mut buffer)?;
		if n == 0 { break; }
		counters.add_read(n as u64);
		log::trace!("decoding chunk of {} bytes", n);
		cursor.feed(&buffer[..n], sink, counters)?;
		counters.checkpoint()?;
	}

	let tokens = cursor.finish(sink, counters)?;
	counters.finish();

	let stats = CodecStats { counters: counters.snapshot(), tokens, elapsed: start.elapsed() };
	log::info!(
		"decoded {} bytes into {} bytes ({} in holes) in {:.2?}",
		stats.counters.bytes_read, stats.counters.bytes_written, stats.counters.hole_bytes_written, stats.elapsed
	);
	Ok(stats)
}

/// Decodes `reader` into a checksum instead of an output.
pub fn inspect<R: Read>(reader: &mut R, config: &CodecConfig) -> Result<StreamInfo, SparseError> {
	let mut sink = ChecksumSink::new(config.checksum);
	let mut counters = Counters::new();
	let stats = decode(reader, &mut sink, config, &mut counters)?;

	Ok(StreamInfo {
		encoded_size: stats.counters.bytes_read,
		decoded_size: sink.len(),
		hole_bytes: stats.counters.hole_bytes_written,
		tokens: stats.tokens,
		checksum: sink.finalize(),
	})
}
