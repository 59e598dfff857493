//! Token grammar shared by the encoder and the decoder.
//!
//! An encoded stream has no header and no trailer, it is a plain sequence of
//! tokens:
//!
//! * literal span: one or more nonzero bytes, copied through unchanged
//! * short zero run: `n + 1` zero bytes standing for `n` zeros, `1 <= n < 1024`
//! * long zero run: `0x00`, the decimal digits of `n`, `0x00`, for `n >= 1024`
//!
//! Zero-run tokens are never adjacent to each other, so a single zero byte
//! can only ever be the opening delimiter of a long run.

pub mod decoder;
pub mod encoder;

pub use decoder::{DecodeCursor, Mode};
pub use encoder::ZeroRunEncoder;

/// Zero runs at least this long are written as a decimal count.
pub const LONG_RUN_THRESHOLD: u64 = 1024;

/// Delimiter byte around a long-run count; also the only byte a literal span cannot hold.
pub const RUN_DELIMITER: u8 = 0x00;

/// Digits needed for `u64::MAX`.
pub const MAX_COUNT_DIGITS: usize = 20;

pub(crate) static ZEROS: [u8; 8192] = [0; 8192];

/// Number of tokens of each kind seen by a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTally {
    pub literal_spans: u64,
    pub short_runs: u64,
    pub long_runs: u64,
}

impl TokenTally {
    pub fn total(&self) -> u64 {
        self.literal_spans + self.short_runs + self.long_runs
    }
}

/// Size on the wire of the token for a run of `n` zeros.
pub fn zero_run_token_len(n: u64) -> u64 {
    if n == 0 {
        0
    } else if n < LONG_RUN_THRESHOLD {
        n + 1
    } else {
        2 + count_digits(n)
    }
}

fn count_digits(mut n: u64) -> u64 {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Splits a buffer into maximal runs of zero or nonzero bytes.
pub fn runs(buf: &[u8]) -> Runs<'_> {
    Runs { rest: buf }
}

pub struct Runs<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Runs<'a> {
    /// `(is_zero, run)`
    type Item = (bool, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let first = *self.rest.first()?;
        let is_zero = first == 0;
        let end = self
            .rest
            .iter()
            .position(|&b| (b == 0) != is_zero)
            .unwrap_or(self.rest.len());
        let (run, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some((is_zero, run))
    }
}

/// Writes `len` zero bytes.
pub(crate) fn write_zeros<W: std::io::Write + ?Sized>(writer: &mut W, mut len: u64) -> std::io::Result<()> {
    while len > 0 {
        let step = len.min(ZEROS.len() as u64) as usize;
        writer.write_all(&ZEROS[..step])?;
        len -= step as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_alternate() {
        let data = b"ab\0\0\0c\0";
        let groups: Vec<_> = runs(data).collect();
        assert_eq!(
            groups,
            vec![
                (false, &b"ab"[..]),
                (true, &b"\0\0\0"[..]),
                (false, &b"c"[..]),
                (true, &b"\0"[..]),
            ]
        );
        assert_eq!(runs(&[]).count(), 0);
    }

    #[test]
    fn test_token_len_at_threshold() {
        assert_eq!(zero_run_token_len(0), 0);
        assert_eq!(zero_run_token_len(1), 2);
        assert_eq!(zero_run_token_len(1023), 1024);
        assert_eq!(zero_run_token_len(1024), 6);
        assert_eq!(zero_run_token_len(u64::MAX), 2 + MAX_COUNT_DIGITS as u64);
    }
}
