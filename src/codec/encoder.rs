use super::{runs, write_zeros, TokenTally, LONG_RUN_THRESHOLD, RUN_DELIMITER};
use crate::counters::Counters;
use crate::error::Result;
use std::io::Write;

/// Incremental encoder. Runs may straddle the buffers passed to [`feed`](Self::feed).
#[derive(Debug, Default)]
pub struct ZeroRunEncoder {
    pending_zeros: u64,
    in_literal: bool,
    tally: TokenTally,
}

impl ZeroRunEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed<W: Write>(&mut self, chunk: &[u8], writer: &mut W, counters: &mut Counters) -> Result<()> {
        for (is_zero, run) in runs(chunk) {
            if is_zero {
                self.pending_zeros += run.len() as u64;
                self.in_literal = false;
                continue;
            }

            self.flush_zero_run(writer, counters)?;
            if !self.in_literal {
                self.tally.literal_spans += 1;
                self.in_literal = true;
            }
            writer.write_all(run)?;
            counters.add_written(run.len() as u64);
        }
        Ok(())
    }

    /// Emits whatever zero run is still pending. Call once, after the last chunk.
    pub fn finish<W: Write>(&mut self, writer: &mut W, counters: &mut Counters) -> Result<TokenTally> {
        self.flush_zero_run(writer, counters)?;
        Ok(self.tally)
    }

    fn flush_zero_run<W: Write>(&mut self, writer: &mut W, counters: &mut Counters) -> Result<()> {
        let n = std::mem::take(&mut self.pending_zeros);
        if n == 0 {
            return Ok(());
        }

        if n < LONG_RUN_THRESHOLD {
            write_zeros(writer, n + 1)?;
            counters.add_written(n + 1);
            self.tally.short_runs += 1;
        } else {
            let mut token = Vec::with_capacity(24);
            token.push(RUN_DELIMITER);
            token.extend_from_slice(n.to_string().as_bytes());
            token.push(RUN_DELIMITER);
            writer.write_all(&token)?;
            counters.add_written(token.len() as u64);
            self.tally.long_runs += 1;
            log::trace!("long zero run of {} bytes", n);
        }
        Ok(())
    }
}
