//! Scan results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanWarning;

/// How a scan that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcome {
    /// Every enumerated directory was handed to a worker and processed.
    Completed,
    /// The cancellation token was raised before the work ran out.
    Cancelled,
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Counters collected over one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Directories found by the tree enumeration (plus the root when included).
    pub dirs_enumerated: u64,
    /// Directories whose every file went through the per-file step.
    pub dirs_scanned: u64,
    /// Directories abandoned part way because of cancellation.
    pub dirs_partial: u64,
    /// Per-file step invocations that succeeded.
    pub files_processed: u64,
    /// Per-file step invocations that failed.
    pub files_failed: u64,
    /// Directories whose file listing failed.
    pub listing_failures: u64,
    /// Entries left out of an enumeration because they could not be read.
    #[serde(default)]
    pub entries_skipped: u64,
}

impl ScanStats {
    /// Total per-file step invocations, successful or not.
    pub fn files_seen(&self) -> u64 {
        self.files_processed + self.files_failed
    }

    /// Number of errors recorded without aborting the scan.
    pub fn errors(&self) -> u64 {
        self.files_failed + self.listing_failures
    }
}

/// Final result of a scan that was not aborted by a fatal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Whether the scan ran out of work or was cancelled.
    pub outcome: ScanOutcome,
    /// Aggregated counters.
    pub stats: ScanStats,
    /// Non-fatal warnings, capped at the configured maximum.
    pub warnings: Vec<ScanWarning>,
    /// Wall-clock duration of the scan.
    pub duration: Duration,
}

impl ScanReport {
    /// True when the scan was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.outcome == ScanOutcome::Cancelled
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.stats.files_seen() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
