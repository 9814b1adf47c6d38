//! Scan progress reporting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use dirfan_core::{ProcessError, ScanError, ScanStats, ScanWarning};

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Directories found by the enumeration so far.
    pub dirs_enumerated: u64,
    /// Directories fully scanned so far.
    pub dirs_scanned: u64,
    /// Files handed to the per-file step so far.
    pub files_processed: u64,
    /// Number of errors/warnings encountered.
    pub errors_count: u64,
    /// Paths waiting in the queue when the snapshot was taken.
    pub queue_len: usize,
    /// Directory most recently finished.
    pub current_path: PathBuf,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            dirs_enumerated: 0,
            dirs_scanned: 0,
            files_processed: 0,
            errors_count: 0,
            queue_len: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_processed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fraction of enumerated directories already scanned, when known.
    pub fn fraction_done(&self) -> Option<f64> {
        (self.dirs_enumerated > 0).then(|| self.dirs_scanned as f64 / self.dirs_enumerated as f64)
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared counters updated by the producer and every worker.
#[derive(Debug)]
pub(crate) struct ScanTracker {
    start_time: Instant,
    dirs_enumerated: AtomicU64,
    dirs_scanned: AtomicU64,
    dirs_partial: AtomicU64,
    files_processed: AtomicU64,
    files_failed: AtomicU64,
    listing_failures: AtomicU64,
    entries_skipped: AtomicU64,
    warnings: Mutex<Vec<ScanWarning>>,
    max_warnings: usize,
    progress_tx: Option<broadcast::Sender<ScanProgress>>,
    progress_interval: u64,
}

impl ScanTracker {
    pub fn new(
        progress_tx: Option<broadcast::Sender<ScanProgress>>,
        progress_interval: u64,
        max_warnings: usize,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            dirs_enumerated: AtomicU64::new(0),
            dirs_scanned: AtomicU64::new(0),
            dirs_partial: AtomicU64::new(0),
            files_processed: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            listing_failures: AtomicU64::new(0),
            entries_skipped: AtomicU64::new(0),
            warnings: Mutex::new(Vec::new()),
            max_warnings,
            progress_tx,
            progress_interval: progress_interval.max(1),
        }
    }

    pub fn record_enumerated(&self, count: u64) {
        self.dirs_enumerated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_file(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_error(&self, path: &Path, error: &ProcessError) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        self.push_warning(ScanWarning::file_failed(path, error));
    }

    pub fn record_listing_error(&self, path: &Path, error: &ScanError) {
        self.listing_failures.fetch_add(1, Ordering::Relaxed);
        self.push_warning(ScanWarning::listing_failed(path, error));
    }

    /// Count entries an enumeration left out and keep their warnings.
    pub fn record_skipped(&self, skipped: Vec<ScanWarning>) {
        if skipped.is_empty() {
            return;
        }
        self.entries_skipped
            .fetch_add(skipped.len() as u64, Ordering::Relaxed);
        for warning in skipped {
            self.push_warning(warning);
        }
    }

    pub fn record_partial_dir(&self) {
        self.dirs_partial.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished directory and publish a snapshot every `progress_interval` of them.
    pub fn record_dir(&self, path: &Path, queue_len: usize) {
        let done = self.dirs_scanned.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.progress_interval == 0 {
            self.publish(path, queue_len);
        }
    }

    /// Send a snapshot to subscribers. Never blocks; missing subscribers are fine.
    pub fn publish(&self, path: &Path, queue_len: usize) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(self.snapshot(path, queue_len));
        }
    }

    pub fn snapshot(&self, path: &Path, queue_len: usize) -> ScanProgress {
        ScanProgress {
            dirs_enumerated: self.dirs_enumerated.load(Ordering::Relaxed),
            dirs_scanned: self.dirs_scanned.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            errors_count: self.files_failed.load(Ordering::Relaxed)
                + self.listing_failures.load(Ordering::Relaxed),
            queue_len,
            current_path: path.to_path_buf(),
            elapsed: self.start_time.elapsed(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            dirs_enumerated: self.dirs_enumerated.load(Ordering::Relaxed),
            dirs_scanned: self.dirs_scanned.load(Ordering::Relaxed),
            dirs_partial: self.dirs_partial.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            listing_failures: self.listing_failures.load(Ordering::Relaxed),
            entries_skipped: self.entries_skipped.load(Ordering::Relaxed),
        }
    }

    pub fn take_warnings(&self) -> Vec<ScanWarning> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn push_warning(&self, warning: ScanWarning) {
        let mut warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
        if warnings.len() < self.max_warnings {
            warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rates() {
        let progress = ScanProgress {
            dirs_enumerated: 200,
            dirs_scanned: 50,
            files_processed: 10_000,
            elapsed: Duration::from_secs(10),
            ..ScanProgress::new()
        };

        assert!((progress.files_per_second() - 1000.0).abs() < 0.1);
        assert_eq!(progress.fraction_done(), Some(0.25));
        assert_eq!(ScanProgress::new().fraction_done(), None);
    }

    #[test]
    fn test_warnings_are_capped_but_counted() {
        let tracker = ScanTracker::new(None, 1, 2);
        for i in 0..5 {
            tracker.record_file_error(
                Path::new(&format!("/f{i}")),
                &ProcessError::other("bad file"),
            );
        }

        assert_eq!(tracker.stats().files_failed, 5);
        assert_eq!(tracker.take_warnings().len(), 2);
        assert!(tracker.take_warnings().is_empty());
    }

    #[test]
    fn test_publishes_every_interval() {
        let (tx, mut rx) = broadcast::channel(16);
        let tracker = ScanTracker::new(Some(tx), 2, 10);
        tracker.record_enumerated(4);

        for i in 0..4 {
            tracker.record_dir(Path::new(&format!("/d{i}")), 7);
        }

        let first = rx.try_recv().unwrap();
        assert_eq!(first.dirs_scanned, 2);
        assert_eq!(first.queue_len, 7);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.dirs_scanned, 4);
        assert_eq!(second.current_path, PathBuf::from("/d3"));
        assert!(rx.try_recv().is_err());
    }
}
