//! Fan-out scan coordinator.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dirfan_core::{MAX_QUEUE_CAPACITY, ScanConfig, ScanError, ScanOutcome, ScanReport};

use crate::processor::{FileProcessor, RecordBuilder};
use crate::producer::produce;
use crate::progress::{ScanProgress, ScanTracker};
use crate::queue::PathQueue;
use crate::source::{DirectorySource, FsDirectorySource};
use crate::worker::{ScanWorker, WorkerExit, WorkerHandle};

/// Scanner that feeds a fixed pool of workers through a bounded queue.
pub struct FanoutScanner {
    source: Arc<dyn DirectorySource>,
    processor: Arc<dyn FileProcessor>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl FanoutScanner {
    /// Create a scanner over the local filesystem that builds a [`FileRecord`](dirfan_core::FileRecord) per file.
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(FsDirectorySource::new()), Arc::new(RecordBuilder::new()))
    }

    /// Create a scanner with custom enumeration and per-file steps.
    pub fn with_collaborators(
        source: Arc<dyn DirectorySource>,
        processor: Arc<dyn FileProcessor>,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            source,
            processor,
            progress_tx,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan `config.root` with `config.workers` workers and a queue of `config.queue_capacity`.
    ///
    /// Workers are started before the producer so listing overlaps with
    /// enumeration. Returns only after every worker has exited. A failed
    /// root enumeration is returned as an error once the workers are down;
    /// a raised `cancel` yields [`ScanOutcome::Cancelled`].
    pub async fn scan(
        &self,
        config: &ScanConfig,
        cancel: Option<CancellationToken>,
    ) -> Result<ScanReport, ScanError> {
        validate(config)?;
        let cancel = cancel.unwrap_or_default();

        let tracker = Arc::new(ScanTracker::new(
            Some(self.progress_tx.clone()),
            config.progress_interval,
            config.max_warnings,
        ));
        let queue = Arc::new(PathQueue::new(config.queue_capacity));

        info!(
            root = %config.root.display(),
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Starting scan"
        );

        let listing_options = config.listing_options();
        let mut workers: Vec<WorkerHandle> = (0..config.workers)
            .map(|id| {
                ScanWorker::new(
                    id,
                    Arc::clone(&queue),
                    cancel.clone(),
                    Arc::clone(&self.source),
                    Arc::clone(&self.processor),
                    listing_options,
                    Arc::clone(&tracker),
                )
                .start()
            })
            .collect();

        let production = produce(
            &config.root,
            &queue,
            Arc::clone(&self.source),
            config.tree_options(),
            config.include_root,
            &cancel,
            &tracker,
        )
        .await;

        info!("Waiting for workers to finish");
        for handle in &mut workers {
            handle.join().await;
        }

        let mut cancelled = false;
        let mut failed = None;
        for handle in &workers {
            debug!(worker = handle.id(), state = ?handle.state(), exit = ?handle.exit(), "Worker joined");
            match handle.exit() {
                Some(WorkerExit::Drained) => {}
                Some(WorkerExit::Cancelled) => cancelled = true,
                Some(WorkerExit::Faulted) | None => {
                    warn!(worker = handle.id(), "Worker faulted");
                    failed.get_or_insert(handle.id());
                }
            }
        }

        tracker.publish(Path::new(""), queue.len());
        let production = production?;
        if let Some(id) = failed {
            return Err(ScanError::WorkerFailed {
                id,
                message: "worker exited abnormally".to_string(),
            });
        }

        let outcome = if cancelled || production.cancelled {
            ScanOutcome::Cancelled
        } else {
            ScanOutcome::Completed
        };
        let report = ScanReport {
            outcome,
            stats: tracker.stats(),
            warnings: tracker.take_warnings(),
            duration: tracker.elapsed(),
        };

        info!(
            outcome = %report.outcome,
            dirs = report.stats.dirs_scanned,
            files = report.stats.files_processed,
            errors = report.stats.errors(),
            duration_ms = report.duration.as_millis() as u64,
            "Scan finished"
        );
        Ok(report)
    }
}

impl Default for FanoutScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject configurations the pipeline cannot run with.
pub(crate) fn validate(config: &ScanConfig) -> Result<(), ScanError> {
    if config.root.as_os_str().is_empty() {
        return Err(ScanError::InvalidConfig {
            message: "Root path cannot be empty".to_string(),
        });
    }
    if config.workers == 0 {
        return Err(ScanError::InvalidConfig {
            message: "Worker count must be at least 1".to_string(),
        });
    }
    if config.queue_capacity == 0 {
        return Err(ScanError::InvalidConfig {
            message: "Queue capacity must be at least 1".to_string(),
        });
    }
    if config.queue_capacity > MAX_QUEUE_CAPACITY {
        return Err(ScanError::InvalidConfig {
            message: format!("Queue capacity must be at most {MAX_QUEUE_CAPACITY}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = tempfile::Builder::new().prefix("dirfan").tempdir().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), "another file here").unwrap();

        temp
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_basic_scan() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .root(temp.path())
            .workers(4usize)
            .queue_capacity(2usize)
            .build()
            .unwrap();

        let report = FanoutScanner::new().scan(&config, None).await.unwrap();

        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(report.stats.dirs_enumerated, 4);
        assert_eq!(report.stats.dirs_scanned, 4);
        assert_eq!(report.stats.files_processed, 4);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_without_root_files() {
        let temp = create_test_tree();
        let mut config = ScanConfig::new(temp.path());
        config.include_root = false;
        config.workers = 2;

        let report = FanoutScanner::new().scan(&config, None).await.unwrap();

        // file1.txt lives directly in the root
        assert_eq!(report.stats.files_processed, 3);
        assert_eq!(report.stats.dirs_scanned, 3);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = ScanConfig::new("/tmp");
        config.workers = 0;
        let err = FanoutScanner::new().scan(&config, None).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));

        let mut config = ScanConfig::new("/tmp");
        config.queue_capacity = 0;
        let err = FanoutScanner::new().scan(&config, None).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_oversized_queue_rejected() {
        let temp = create_test_tree();
        let mut config = ScanConfig::new(temp.path());
        config.queue_capacity = usize::MAX;

        let err = FanoutScanner::new().scan(&config, None).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreadable_root_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = create_test_tree();
        let root = temp.path().join("dir1");
        fs::set_permissions(&root, fs::Permissions::from_mode(0o111)).unwrap();
        if fs::read_dir(&root).is_ok() {
            // Root ignores the mode bits
            fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        for include_root in [true, false] {
            let mut config = ScanConfig::new(&root);
            config.workers = 4;
            config.include_root = include_root;

            let result = FanoutScanner::new().scan(&config, None).await;
            assert!(
                matches!(result, Err(ScanError::PermissionDenied { .. })),
                "include_root = {include_root}: {result:?}"
            );
        }

        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config = ScanConfig::new(temp.path().join("missing"));

        let err = FanoutScanner::new().scan(&config, None).await.unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }
}
