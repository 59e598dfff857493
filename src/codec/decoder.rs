//! Decode cursor: a two-state scanner over zero / nonzero runs.
//!
//! The cursor sees the encoded stream as alternating runs, exactly the way the
//! encoder grouped the original bytes. A zero run is only interpreted once it
//! is closed, either by the first nonzero byte after it or by end of stream,
//! because its length decides what it means:
//!
//! | mode                 | closed zero run | meaning                                  |
//! |----------------------|-----------------|------------------------------------------|
//! | `Normal`             | 1               | opening delimiter, next run is a count   |
//! | `Normal`             | n > 1           | short run, `n - 1` literal zeros         |
//! | `AccumulatingCount`  | 1               | closing delimiter, count becomes a skip  |
//! | `AccumulatingCount`  | n > 1           | malformed, counts end with one zero      |
//!
//! Nonzero runs are count digits while accumulating and literal data
//! otherwise. A pending skip is realised with [`HoleSink::seek_forward`]
//! right before the next literal byte. At end of stream the output is
//! extended with [`HoleSink::set_length`] instead, since a seek with nothing
//! written after it does not change the file length.

use super::{runs, write_zeros, TokenTally, MAX_COUNT_DIGITS};
use crate::counters::Counters;
use crate::error::{Result, SparseError};
use crate::sink::HoleSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    AccumulatingCount,
}

#[derive(Debug)]
pub struct DecodeCursor {
    mode: Mode,
    pending_digits: String,
    pending_skip: u64,
    pending_literal_zeros: u64,
    /// Length of the zero run currently open.
    zero_run: u64,
    in_literal: bool,
    /// Encoded bytes consumed so far.
    consumed: u64,
    /// Decoded bytes produced so far, holes included.
    produced: u64,
    tally: TokenTally,
}

impl Default for DecodeCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeCursor {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            pending_digits: String::new(),
            pending_skip: 0,
            pending_literal_zeros: 0,
            zero_run: 0,
            in_literal: false,
            consumed: 0,
            produced: 0,
            tally: TokenTally::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pending_skip(&self) -> u64 {
        self.pending_skip
    }

    pub fn pending_literal_zeros(&self) -> u64 {
        self.pending_literal_zeros
    }

    pub fn tally(&self) -> TokenTally {
        self.tally
    }

    pub fn feed<S: HoleSink>(&mut self, chunk: &[u8], sink: &mut S, counters: &mut Counters) -> Result<()> {
        for (is_zero, run) in runs(chunk) {
            if is_zero {
                self.zero_run += run.len() as u64;
                self.in_literal = false;
            } else {
                self.on_nonzero_run(run, sink, counters)?;
            }
            self.consumed += run.len() as u64;
        }
        Ok(())
    }

    /// Resolves the end of the stream and fixes up the output length.
    ///
    /// Any zeros still pending here, a trailing short run included, are
    /// realised by extending the output and counted as hole bytes.
    pub fn finish<S: HoleSink>(mut self, sink: &mut S, counters: &mut Counters) -> Result<TokenTally> {
        if self.zero_run > 0 {
            let run = std::mem::take(&mut self.zero_run);
            self.close_zero_run(run)?;
        }

        if self.mode == Mode::AccumulatingCount {
            let reason = if self.pending_digits.is_empty() {
                "stream ends after a run-length delimiter"
            } else {
                "stream ends inside a run-length count"
            };
            return Err(SparseError::TruncatedStream { offset: self.consumed, reason });
        }

        let extension = self.take_pending()?;
        if extension > 0 {
            self.advance(extension)?;
            sink.flush()?;
            let end = sink.offset()?.checked_add(extension).ok_or_else(|| self.past_end(extension))?;
            sink.set_length(end)?;
            counters.add_hole(extension);
            log::debug!("extended output by {} bytes to {}", extension, end);
        }
        sink.flush()?;
        Ok(self.tally)
    }

    fn on_nonzero_run<S: HoleSink>(&mut self, run: &[u8], sink: &mut S, counters: &mut Counters) -> Result<()> {
        if self.zero_run > 0 {
            let zeros = std::mem::take(&mut self.zero_run);
            self.close_zero_run(zeros)?;
        }

        match self.mode {
            Mode::AccumulatingCount => self.push_digits(run),
            Mode::Normal => {
                self.flush_pending(sink, counters)?;
                if !self.in_literal {
                    self.tally.literal_spans += 1;
                    self.in_literal = true;
                }
                self.advance(run.len() as u64)?;
                sink.write_all(run)?;
                counters.add_written(run.len() as u64);
                Ok(())
            }
        }
    }

    fn close_zero_run(&mut self, len: u64) -> Result<()> {
        match self.mode {
            Mode::AccumulatingCount => {
                if len != 1 {
                    return Err(SparseError::TruncatedStream {
                        offset: self.consumed,
                        reason: "run-length count not closed by a single zero byte",
                    });
                }
                self.pending_skip = self.parse_count()?;
                self.pending_digits.clear();
                self.mode = Mode::Normal;
                self.tally.long_runs += 1;
            }
            Mode::Normal => {
                if self.pending_skip > 0 || self.pending_literal_zeros > 0 {
                    return Err(SparseError::InternalInvariantViolation(format!(
                        "zero run closed at offset {} with output still pending (skip {}, zeros {})",
                        self.consumed, self.pending_skip, self.pending_literal_zeros
                    )));
                }
                if len == 1 {
                    self.mode = Mode::AccumulatingCount;
                } else {
                    self.pending_literal_zeros = len - 1;
                    self.tally.short_runs += 1;
                }
            }
        }
        Ok(())
    }

    fn push_digits(&mut self, run: &[u8]) -> Result<()> {
        if let Some(bad) = run.iter().position(|b| !b.is_ascii_digit()) {
            return Err(SparseError::MalformedCount {
                offset: self.consumed + bad as u64,
                digits: self.shown_digits(run),
            });
        }
        if self.pending_digits.len() + run.len() > MAX_COUNT_DIGITS {
            return Err(SparseError::MalformedCount { offset: self.consumed, digits: self.shown_digits(run) });
        }
        // only ASCII digits past the check above
        self.pending_digits.extend(run.iter().map(|&b| b as char));
        Ok(())
    }

    /// Pending digits plus the start of `run`, for error messages.
    fn shown_digits(&self, run: &[u8]) -> String {
        let shown = &run[..run.len().min(MAX_COUNT_DIGITS + 1)];
        format!("{}{}", self.pending_digits, String::from_utf8_lossy(shown))
    }

    fn parse_count(&self) -> Result<u64> {
        self.pending_digits.parse::<u64>().map_err(|_| SparseError::MalformedCount {
            offset: self.consumed,
            digits: self.pending_digits.clone(),
        })
    }

    /// Moves the decoded length forward, rejecting output past `u64::MAX`.
    fn advance(&mut self, len: u64) -> Result<()> {
        self.produced = self.produced.checked_add(len).ok_or_else(|| self.past_end(len))?;
        Ok(())
    }

    fn past_end(&self, len: u64) -> SparseError {
        SparseError::MalformedCount {
            offset: self.consumed,
            digits: format!("{} (decoded length passes u64::MAX)", len),
        }
    }

    /// Takes whichever of the pending skip / literal zeros is set.
    fn take_pending(&mut self) -> Result<u64> {
        match (self.pending_skip, self.pending_literal_zeros) {
            (skip, 0) => {
                self.pending_skip = 0;
                Ok(skip)
            }
            (0, zeros) => {
                self.pending_literal_zeros = 0;
                Ok(zeros)
            }
            (skip, zeros) => Err(SparseError::InternalInvariantViolation(format!(
                "both a skip of {} and {} literal zeros pending at offset {}",
                skip, zeros, self.consumed
            ))),
        }
    }

    fn flush_pending<S: HoleSink>(&mut self, sink: &mut S, counters: &mut Counters) -> Result<()> {
        let is_skip = self.pending_skip > 0;
        let len = self.take_pending()?;
        if len == 0 {
            return Ok(());
        }
        self.advance(len)?;

        if is_skip {
            sink.seek_forward(len)?;
            counters.add_hole(len);
            log::debug!("hole of {} bytes", len);
        } else {
            write_zeros(sink, len)?;
            counters.add_written(len);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Write};

    #[derive(Debug, PartialEq, Eq)]
    enum Op {
        Write(Vec<u8>),
        Seek(u64),
        SetLength(u64),
    }

    /// Records the operations the cursor performs.
    #[derive(Default)]
    struct RecordingSink {
        ops: Vec<Op>,
        offset: u64,
    }

    impl Write for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.ops.last_mut() {
                Some(Op::Write(data)) => data.extend_from_slice(buf),
                _ => self.ops.push(Op::Write(buf.to_vec())),
            }
            self.offset += buf.len() as u64;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl HoleSink for RecordingSink {
        fn seek_forward(&mut self, len: u64) -> io::Result<()> {
            self.ops.push(Op::Seek(len));
            self.offset += len;
            Ok(())
        }

        fn offset(&mut self) -> io::Result<u64> {
            Ok(self.offset)
        }

        fn set_length(&mut self, len: u64) -> io::Result<()> {
            self.ops.push(Op::SetLength(len));
            Ok(())
        }
    }

    fn decode_chunks(chunks: &[&[u8]]) -> Result<(Vec<u8>, TokenTally, Counters)> {
        let mut cursor = DecodeCursor::new();
        let mut sink = Cursor::new(Vec::new());
        let mut counters = Counters::new();
        for chunk in chunks {
            cursor.feed(chunk, &mut sink, &mut counters)?;
        }
        let tally = cursor.finish(&mut sink, &mut counters)?;
        Ok((sink.into_inner(), tally, counters))
    }

    #[test]
    fn test_short_run_written_as_zeros() {
        let (out, tally, counters) = decode_chunks(&[b"AB\0\0\0\0\0\0CD"]).unwrap();
        assert_eq!(out, b"AB\0\0\0\0\0CD");
        assert_eq!(tally, TokenTally { literal_spans: 2, short_runs: 1, long_runs: 0 });
        assert_eq!(counters.snapshot().hole_bytes_written, 0);
    }

    #[test]
    fn test_long_run_becomes_seek() {
        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        cursor.feed(b"ab\x002048\x00cd", &mut sink, &mut counters).unwrap();
        cursor.finish(&mut sink, &mut counters).unwrap();

        assert_eq!(
            sink.ops,
            vec![Op::Write(b"ab".to_vec()), Op::Seek(2048), Op::Write(b"cd".to_vec())]
        );
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.hole_bytes_written, 2048);
        assert_eq!(snapshot.bytes_written, 2052);
    }

    #[test]
    fn test_trailing_hole_sets_length() {
        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        cursor.feed(b"data\x002000\x00", &mut sink, &mut counters).unwrap();
        assert_eq!(cursor.mode(), Mode::AccumulatingCount);
        cursor.finish(&mut sink, &mut counters).unwrap();

        assert_eq!(sink.ops, vec![Op::Write(b"data".to_vec()), Op::SetLength(2004)]);
        assert_eq!(counters.snapshot().hole_bytes_written, 2000);
    }

    #[test]
    fn test_trailing_short_run_extends_output() {
        let (out, _, counters) = decode_chunks(&[b"x\0\0\0\0"]).unwrap();
        assert_eq!(out, b"x\0\0\0");
        assert_eq!(counters.snapshot().hole_bytes_written, 3);
    }

    #[test]
    fn test_tokens_split_across_chunks() {
        let (out, tally, _) = decode_chunks(&[b"a\0", b"15", b"00", b"\0", b"b\0\0", b"\0c"]).unwrap();
        let mut expected = b"a".to_vec();
        expected.extend(vec![0u8; 1500]);
        expected.extend_from_slice(b"b\0\0c");
        assert_eq!(out, expected);
        assert_eq!(tally, TokenTally { literal_spans: 3, short_runs: 1, long_runs: 1 });
    }

    #[test]
    fn test_cursor_state_while_counting() {
        let mut cursor = DecodeCursor::new();
        let mut sink = Cursor::new(Vec::new());
        let mut counters = Counters::new();

        cursor.feed(b"z\x0012", &mut sink, &mut counters).unwrap();
        assert_eq!(cursor.mode(), Mode::AccumulatingCount);
        assert_eq!(cursor.pending_skip(), 0);

        cursor.feed(b"34\x00", &mut sink, &mut counters).unwrap();
        // the closing zero is only resolved once the next run starts
        assert_eq!(cursor.mode(), Mode::AccumulatingCount);

        cursor.feed(b"q", &mut sink, &mut counters).unwrap();
        assert_eq!(cursor.mode(), Mode::Normal);
        assert_eq!(cursor.pending_skip(), 0);
        assert_eq!(cursor.pending_literal_zeros(), 0);
        assert_eq!(sink.get_ref().len(), 1 + 1234 + 1);
    }

    #[test]
    fn test_malformed_count() {
        match decode_chunks(&[b"\x0012a3\x00"]) {
            Err(SparseError::MalformedCount { offset, digits }) => {
                assert_eq!(offset, 3);
                assert_eq!(digits, "12a3");
            }
            other => panic!("expected MalformedCount, got {:?}", other.map(|r| r.0)),
        }
    }

    #[test]
    fn test_count_overflow_is_malformed() {
        let err = decode_chunks(&[b"\x00999999999999999999999\x00"]).unwrap_err();
        assert!(matches!(err, SparseError::MalformedCount { .. }));

        let err = decode_chunks(&[b"\x0018446744073709551616\x00"]).unwrap_err();
        assert!(matches!(err, SparseError::MalformedCount { .. }));
    }

    #[test]
    fn test_truncated_streams() {
        let err = decode_chunks(&[b"\x001500"]).unwrap_err();
        assert!(matches!(err, SparseError::TruncatedStream { .. }));

        let err = decode_chunks(&[b"abc\0"]).unwrap_err();
        assert!(matches!(err, SparseError::TruncatedStream { .. }));

        let err = decode_chunks(&[b"\x001500\0\0x"]).unwrap_err();
        assert!(matches!(err, SparseError::TruncatedStream { .. }));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_largest_count_as_trailing_hole() {
        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        cursor.feed(b"\x0018446744073709551615\x00", &mut sink, &mut counters).unwrap();
        cursor.finish(&mut sink, &mut counters).unwrap();

        assert_eq!(sink.ops, vec![Op::SetLength(u64::MAX)]);
        assert_eq!(counters.snapshot().hole_bytes_written, u64::MAX);
    }

    #[test]
    fn test_largest_count_rejects_output_past_it() {
        // a literal after the hole
        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        let err = cursor.feed(b"\x0018446744073709551615\x00x", &mut sink, &mut counters).unwrap_err();
        assert!(matches!(err, SparseError::MalformedCount { .. }));
        assert_eq!(sink.ops, vec![Op::Seek(u64::MAX)]);

        // data before a trailing hole
        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        cursor.feed(b"abc\x0018446744073709551615\x00", &mut sink, &mut counters).unwrap();
        let err = cursor.finish(&mut sink, &mut counters).unwrap_err();
        assert!(matches!(err, SparseError::MalformedCount { .. }));
        assert_eq!(sink.ops, vec![Op::Write(b"abc".to_vec())]);
        assert_eq!(counters.snapshot().bytes_written, 3);
    }

    #[test]
    fn test_count_digit_limit_across_chunks() {
        let twenty = b"12345678901234567890";
        let err = decode_chunks(&[b"\x00", twenty, b"1\x00"]).unwrap_err();
        match err {
            SparseError::MalformedCount { offset, digits } => {
                assert_eq!(offset, 21);
                assert_eq!(digits, "123456789012345678901");
            }
            other => panic!("expected MalformedCount, got {:?}", other),
        }

        // twenty digits that fit still decode
        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        cursor.feed(b"\x0010000000000000000000\x00", &mut sink, &mut counters).unwrap();
        cursor.finish(&mut sink, &mut counters).unwrap();
        assert_eq!(sink.ops, vec![Op::SetLength(10_000_000_000_000_000_000)]);
    }

    #[test]
    fn test_conflicting_pending_output_is_invariant_violation() {
        let mut cursor = DecodeCursor::new();
        cursor.pending_skip = 2048;
        cursor.pending_literal_zeros = 3;
        let err = cursor.finish(&mut RecordingSink::default(), &mut Counters::new()).unwrap_err();
        assert!(matches!(err, SparseError::InternalInvariantViolation(_)));
        assert!(!err.is_format_error());

        let mut cursor = DecodeCursor::new();
        let mut sink = RecordingSink::default();
        let mut counters = Counters::new();
        cursor.pending_skip = 2048;
        let err = cursor.feed(b"\0\0x", &mut sink, &mut counters).unwrap_err();
        assert!(matches!(err, SparseError::InternalInvariantViolation(_)));
    }

    #[test]
    fn test_empty_stream() {
        let (out, tally, counters) = decode_chunks(&[]).unwrap();
        assert!(out.is_empty());
        assert_eq!(tally.total(), 0);
        assert_eq!(counters.snapshot(), Default::default());
    }
}
