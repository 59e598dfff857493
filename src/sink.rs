//! Output handles for the decoder.
//!
//! Decoding needs more from its output than `Write`: long zero runs are
//! realised by moving the write position forward, and a stream that ends
//! inside a run is finished by setting the output length. [`HoleSink`] is that
//! capability. Regular files get real holes; pipes and terminals go through
//! [`ZeroFillSink`], which turns every hole back into written zeros.

use crate::checksum::{ChecksumResult, Checksummer};
use crate::codec::write_zeros;
use crate::config::ChecksumType;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};

pub trait HoleSink: Write {
    /// Moves the write position `len` bytes forward without writing the gap.
    fn seek_forward(&mut self, len: u64) -> io::Result<()>;

    /// Current write position from the start of the output.
    fn offset(&mut self) -> io::Result<u64>;

    /// Truncates or extends the output to exactly `len` bytes.
    fn set_length(&mut self, len: u64) -> io::Result<()>;
}

fn seek_distance(len: u64) -> io::Result<i64> {
    i64::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek distance too large"))
}

impl HoleSink for File {
    fn seek_forward(&mut self, len: u64) -> io::Result<()> {
        self.seek(SeekFrom::Current(seek_distance(len)?)).map(|_| ())
    }

    fn offset(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl HoleSink for BufWriter<File> {
    fn seek_forward(&mut self, len: u64) -> io::Result<()> {
        // BufWriter flushes before seeking
        self.seek(SeekFrom::Current(seek_distance(len)?)).map(|_| ())
    }

    fn offset(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.flush()?;
        self.get_ref().set_len(len)
    }
}

impl HoleSink for Cursor<Vec<u8>> {
    fn seek_forward(&mut self, len: u64) -> io::Result<()> {
        let target = self
            .position()
            .checked_add(len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek past u64::MAX"))?;
        self.set_position(target);
        Ok(())
    }

    fn offset(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        let too_large = || io::Error::new(io::ErrorKind::OutOfMemory, "output does not fit in memory");
        let len = usize::try_from(len).map_err(|_| too_large())?;
        let buf = self.get_mut();
        buf.try_reserve(len.saturating_sub(buf.len())).map_err(|_| too_large())?;
        buf.resize(len, 0);
        Ok(())
    }
}

/// Fallback for outputs that cannot seek: holes become written zeros.
#[derive(Debug)]
pub struct ZeroFillSink<W: Write> {
    inner: W,
    offset: u64,
}

impl<W: Write> ZeroFillSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ZeroFillSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> HoleSink for ZeroFillSink<W> {
    fn seek_forward(&mut self, len: u64) -> io::Result<()> {
        write_zeros(&mut self.inner, len)?;
        self.offset += len;
        Ok(())
    }

    fn offset(&mut self) -> io::Result<u64> {
        Ok(self.offset)
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        if len < self.offset {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "cannot shrink a zero-filled stream"));
        }
        self.seek_forward(len - self.offset)
    }
}

/// Digests everything the decoder produces instead of storing it.
///
/// Skipped ranges are hashed as zeros once something lands past them, so
/// very large holes cost hashing time but no memory.
#[derive(Debug)]
pub struct ChecksumSink {
    hasher: Checksummer,
    offset: u64,
    hashed: u64,
}

impl ChecksumSink {
    pub fn new(checksum: ChecksumType) -> Self {
        Self { hasher: Checksummer::new(checksum), offset: 0, hashed: 0 }
    }

    /// Length of the content seen so far.
    pub fn len(&self) -> u64 {
        self.hashed
    }

    pub fn is_empty(&self) -> bool {
        self.hashed == 0
    }

    pub fn finalize(self) -> ChecksumResult {
        self.hasher.finalize()
    }

    fn hash_zeros_up_to(&mut self, end: u64) {
        while self.hashed < end {
            let step = (end - self.hashed).min(crate::codec::ZEROS.len() as u64) as usize;
            self.hasher.update(&crate::codec::ZEROS[..step]);
            self.hashed += step as u64;
        }
    }
}

impl Write for ChecksumSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.offset < self.hashed {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "cannot rewrite hashed output"));
        }
        self.hash_zeros_up_to(self.offset);
        self.hasher.update(buf);
        self.offset += buf.len() as u64;
        self.hashed = self.offset;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl HoleSink for ChecksumSink {
    fn seek_forward(&mut self, len: u64) -> io::Result<()> {
        self.offset = self
            .offset
            .checked_add(len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek past u64::MAX"))?;
        Ok(())
    }

    fn offset(&mut self) -> io::Result<u64> {
        Ok(self.offset)
    }

    fn set_length(&mut self, len: u64) -> io::Result<()> {
        if len < self.hashed {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "cannot shrink hashed output"));
        }
        self.hash_zeros_up_to(len);
        Ok(())
    }
}
