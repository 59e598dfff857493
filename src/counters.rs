//! Byte counters shared between a running pipeline and its driver.
//!
//! The pipeline owns the `&mut Counters` for the duration of a run and is the
//! only writer. Anything outside the pipeline (a signal handler, a Ctrl-C
//! thread) talks to it through a [`ProgressSignal`], which only ever flips
//! atomic flags. Those flags are looked at in [`Counters::checkpoint`], which
//! the pipelines call once per chunk.

use crate::error::{Result, SparseError};
use indicatif::ProgressBar;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Part of `bytes_written` produced by seeking or extending rather than writing.
    pub hole_bytes_written: u64,
}

/// Cloneable handle for out-of-band requests against a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProgressSignal {
    report: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl ProgressSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a progress report at the next chunk boundary.
    pub fn request_report(&self) {
        self.report.store(true, Ordering::Relaxed);
    }

    /// Ask the pipeline to stop at the next chunk boundary.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn take_report(&self) -> bool {
        self.report.swap(false, Ordering::Relaxed)
    }
}

type Reporter = Box<dyn FnMut(&CounterSnapshot) + Send>;

pub struct Counters {
    bytes_read: u64,
    bytes_written: u64,
    hole_bytes_written: u64,
    signal: ProgressSignal,
    reporter: Option<Reporter>,
    progress_bar: Option<ProgressBar>,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            bytes_read: 0,
            bytes_written: 0,
            hole_bytes_written: 0,
            signal: ProgressSignal::new(),
            reporter: None,
            progress_bar: None,
        }
    }

    pub fn with_signal(mut self, signal: ProgressSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Called with the current counts whenever a report has been requested.
    /// Without a reporter the counts go to the log at `info` level.
    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: FnMut(&CounterSnapshot) + Send + 'static,
    {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Keeps `bar` positioned at `bytes_read`.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    pub fn signal(&self) -> ProgressSignal {
        self.signal.clone()
    }

    pub fn add_read(&mut self, n: u64) {
        self.bytes_read = self.bytes_read.saturating_add(n);
    }

    pub fn add_written(&mut self, n: u64) {
        self.bytes_written = self.bytes_written.saturating_add(n);
    }

    /// Records `n` bytes of output that were produced as a hole.
    /// Counters saturate at `u64::MAX`.
    pub fn add_hole(&mut self, n: u64) {
        self.bytes_written = self.bytes_written.saturating_add(n);
        self.hole_bytes_written = self.hole_bytes_written.saturating_add(n);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            bytes_read: self.bytes_read,
            bytes_written: self.bytes_written,
            hole_bytes_written: self.hole_bytes_written,
        }
    }

    /// Services pending requests. Must only be called between chunks.
    pub fn checkpoint(&mut self) -> Result<()> {
        if let Some(bar) = &self.progress_bar {
            bar.set_position(self.bytes_read);
        }

        if self.signal.take_report() {
            let snapshot = self.snapshot();
            match self.reporter.as_mut() {
                Some(report) => report(&snapshot),
                None => log::info!(
                    "read {} bytes, wrote {} bytes ({} in holes)",
                    snapshot.bytes_read,
                    snapshot.bytes_written,
                    snapshot.hole_bytes_written
                ),
            }
        }

        if self.signal.is_cancelled() {
            return Err(SparseError::Cancelled { offset: self.bytes_read });
        }
        Ok(())
    }

    /// Stops the progress bar, if any.
    pub fn finish(&mut self) {
        if let Some(bar) = self.progress_bar.take() {
            bar.set_position(self.bytes_read);
            bar.finish_and_clear();
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counters")
            .field("bytes_read", &self.bytes_read)
            .field("bytes_written", &self.bytes_written)
            .field("hole_bytes_written", &self.hole_bytes_written)
            .field("cancelled", &self.signal.is_cancelled())
            .finish()
    }
}
