//! Single-threaded baseline scanner.
//!
//! Walks the same directories with the same collaborators as
//! [`FanoutScanner`](crate::FanoutScanner), one directory after another on
//! the calling thread. Useful for comparing timings.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use dirfan_core::{ScanConfig, ScanError, ScanOutcome, ScanReport};

use crate::processor::{FileProcessor, RecordBuilder};
use crate::progress::ScanTracker;
use crate::scanner::validate;
use crate::source::{DirectorySource, FsDirectorySource};
use crate::worker::{DirectoryOutcome, scan_directory};

/// Sequential scanner.
pub struct LinearScanner {
    source: Arc<dyn DirectorySource>,
    processor: Arc<dyn FileProcessor>,
}

impl LinearScanner {
    /// Create a scanner over the local filesystem.
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(FsDirectorySource::new()), Arc::new(RecordBuilder::new()))
    }

    /// Create a scanner with custom enumeration and per-file steps.
    pub fn with_collaborators(
        source: Arc<dyn DirectorySource>,
        processor: Arc<dyn FileProcessor>,
    ) -> Self {
        Self { source, processor }
    }

    /// Scan `config.root` on the calling thread. Worker and queue settings are ignored.
    pub fn scan(
        &self,
        config: &ScanConfig,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        validate(config)?;
        let tracker = ScanTracker::new(None, config.progress_interval, config.max_warnings);

        info!(root = %config.root.display(), "Enumerating directories");
        let listing = self
            .source
            .list_directories(&config.root, &config.tree_options())?;
        tracker.record_skipped(listing.skipped);
        let mut directories = listing.paths;
        if config.include_root {
            directories.insert(0, config.root.clone());
        }
        tracker.record_enumerated(directories.len() as u64);
        info!(found = directories.len(), "Enumerated directories");

        let options = config.listing_options();
        let mut outcome = ScanOutcome::Completed;
        for dir in &directories {
            if cancel.is_cancelled() {
                outcome = ScanOutcome::Cancelled;
                break;
            }
            match scan_directory(dir, &*self.source, &*self.processor, &options, cancel, &tracker) {
                DirectoryOutcome::Scanned { .. } => tracker.record_dir(dir, 0),
                DirectoryOutcome::Interrupted { .. } => {
                    outcome = ScanOutcome::Cancelled;
                    break;
                }
                DirectoryOutcome::ListingFailed => {}
            }
        }

        Ok(ScanReport {
            outcome,
            stats: tracker.stats(),
            warnings: tracker.take_warnings(),
            duration: tracker.elapsed(),
        })
    }
}

impl Default for LinearScanner {
    fn default() -> Self {
        Self::new()
    }
}
