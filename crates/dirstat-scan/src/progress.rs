//! Walk progress reporting.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Number of files accumulated before a progress event is sent.
pub(crate) const PROGRESS_BATCH: u64 = 256;

/// Incremental progress since the previous event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkProgress {
    /// Bytes of files visited since the last event.
    pub bytes: u64,
    /// Files visited since the last event.
    pub files: u64,
}

/// Running totals built by a consumer from [`WalkProgress`] deltas.
#[derive(Debug, Clone)]
pub struct ProgressTotals {
    /// Total bytes seen so far.
    pub bytes: u64,
    /// Total files seen so far.
    pub files: u64,
    started: Instant,
}

impl ProgressTotals {
    /// Start counting now.
    pub fn new() -> Self {
        Self {
            bytes: 0,
            files: 0,
            started: Instant::now(),
        }
    }

    /// Apply one delta.
    pub fn apply(&mut self, delta: WalkProgress) {
        self.bytes += delta.bytes;
        self.files += delta.files;
    }

    /// Time since counting started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Calculate walk rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.files as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for ProgressTotals {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer-side batching of progress deltas.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    tx: broadcast::Sender<WalkProgress>,
    pending: WalkProgress,
}

impl ProgressTracker {
    pub fn new(tx: broadcast::Sender<WalkProgress>) -> Self {
        Self {
            tx,
            pending: WalkProgress::default(),
        }
    }

    pub fn record_file(&mut self, size: u64) {
        self.pending.bytes += size;
        self.pending.files += 1;
        if self.pending.files >= PROGRESS_BATCH {
            self.flush();
        }
    }

    /// Send whatever is pending. Having no subscribers is not an error.
    pub fn flush(&mut self) {
        if self.pending == WalkProgress::default() {
            return;
        }
        let _ = self.tx.send(std::mem::take(&mut self.pending));
    }
}
