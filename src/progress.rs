//! # Progress Reporting
//!
//! The original tsMuxer core writes completion percentage straight to the
//! console via a global logger. This crate takes an injected observer
//! instead, so embedding applications (and tests) can capture progress
//! without the core depending on any particular UI.

/// Receives progress updates as the interleaver advances through its
/// tracks. Implementors may render a progress bar, forward to a GUI, or (in
/// tests) just record calls.
pub trait ProgressObserver: Send {
    /// Called with the overall completion percentage (0-100) whenever it
    /// changes by at least one whole point.
    fn on_progress(&mut self, percent: u32);

    /// Called once demultiplexing has produced its last packet.
    fn on_finished(&mut self) {}
}

/// A [`ProgressObserver`] that discards every update; the default when an
/// embedder doesn't care about progress.
#[derive(Debug, Default)]
pub struct NullProgressObserver;

impl ProgressObserver for NullProgressObserver {
    fn on_progress(&mut self, _percent: u32) {}
}

/// A [`ProgressObserver`] that records every update it receives, for tests
/// that assert on progress behavior.
#[derive(Debug, Default)]
pub struct RecordingProgressObserver {
    /// Every percentage value reported, in call order.
    pub updates: Vec<u32>,
    /// Whether `on_finished` was called.
    pub finished: bool,
}

impl ProgressObserver for RecordingProgressObserver {
    fn on_progress(&mut self, percent: u32) {
        self.updates.push(percent);
    }

    fn on_finished(&mut self) {
        self.finished = true;
    }
}

/// Derives a 0-100 percentage from a processed/total byte pair, clamping
/// to 100 when `total` is 0 (an empty or not-yet-sized source).
pub fn percent_of(processed: i64, total: i64) -> u32 {
    if total <= 0 {
        return 100;
    }
    let pct = (processed.max(0) as f64 / total as f64) * 100.0;
    pct.clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_progress_updates() {
        let mut observer = RecordingProgressObserver::default();
        observer.on_progress(10);
        observer.on_progress(50);
        observer.on_finished();
        assert_eq!(observer.updates, vec![10, 50]);
        assert!(observer.finished);
    }

    #[test]
    fn percent_of_clamps_and_handles_zero_total() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(50, 100), 50);
        assert_eq!(percent_of(150, 100), 100);
        assert_eq!(percent_of(-10, 100), 0);
    }
}
