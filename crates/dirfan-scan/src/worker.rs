//! Scan workers.
//!
//! Each worker:
//! - Pulls directory paths from the shared [`PathQueue`]
//! - Lists the files directly inside each directory
//! - Runs the per-file step on every file, ignoring its result
//! - Stops when the queue is closed and drained, or when cancelled
//!
//! Listing and per-file work are blocking calls, so each directory is
//! handled on tokio's blocking pool while the worker task itself only
//! waits on the queue.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use dirfan_core::EnumerationOptions;

use crate::processor::FileProcessor;
use crate::progress::ScanTracker;
use crate::queue::{Dequeued, PathQueue};
use crate::source::DirectorySource;

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Created, not started.
    Idle = 0,
    /// Pulling from an open queue.
    Running = 1,
    /// The queue is closed; finishing what is left in it.
    Draining = 2,
    /// The read loop has exited. Terminal.
    Done = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Done,
        }
    }
}

/// Why a worker's read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue was closed and empty.
    Drained,
    /// The cancellation token was raised.
    Cancelled,
    /// The loop died abnormally (a panic in a collaborator).
    Faulted,
}

/// What happened to one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectoryOutcome {
    /// Every listed file went through the per-file step.
    Scanned { files: usize },
    /// Cancellation was observed before the last file.
    Interrupted { files: usize },
    /// The listing call failed; nothing was processed.
    ListingFailed,
}

/// List one directory and run the per-file step on each file.
///
/// Checks `cancel` before every file. Per-file and listing failures are
/// recorded on `tracker` and never returned.
pub(crate) fn scan_directory(
    dir: &Path,
    source: &dyn DirectorySource,
    processor: &dyn FileProcessor,
    options: &EnumerationOptions,
    cancel: &CancellationToken,
    tracker: &ScanTracker,
) -> DirectoryOutcome {
    let files = match source.list_files(dir, options) {
        Ok(listing) => {
            tracker.record_skipped(listing.skipped);
            listing.paths
        }
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Directory listing failed");
            tracker.record_listing_error(dir, &e);
            return DirectoryOutcome::ListingFailed;
        }
    };

    for (done, file) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(path = %dir.display(), done, total = files.len(), "Abandoning directory on cancellation");
            tracker.record_partial_dir();
            return DirectoryOutcome::Interrupted { files: done };
        }

        // The file path doubles as the record id, lossily for non UTF-8 names
        let id = file.to_string_lossy();
        match processor.process(file, &id) {
            Ok(_) => tracker.record_file(),
            Err(e) => {
                debug!(path = %file.display(), error = %e, "File processing failed");
                tracker.record_file_error(file, &e);
            }
        }
    }

    DirectoryOutcome::Scanned { files: files.len() }
}

/// Sets the completion marker when the read loop is left, however it is left.
struct CompletionGuard {
    marker: Arc<OnceLock<WorkerExit>>,
    state: Arc<AtomicU8>,
    exit: WorkerExit,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self.marker.set(self.exit);
        self.state.store(WorkerState::Done as u8, Ordering::Release);
    }
}

/// A pool slot: everything one worker needs before it is started.
pub struct ScanWorker {
    id: usize,
    queue: Arc<PathQueue>,
    cancel: CancellationToken,
    source: Arc<dyn DirectorySource>,
    processor: Arc<dyn FileProcessor>,
    options: EnumerationOptions,
    tracker: Arc<ScanTracker>,
    state: Arc<AtomicU8>,
    completion: Arc<OnceLock<WorkerExit>>,
}

impl ScanWorker {
    /// Create an idle worker.
    pub(crate) fn new(
        id: usize,
        queue: Arc<PathQueue>,
        cancel: CancellationToken,
        source: Arc<dyn DirectorySource>,
        processor: Arc<dyn FileProcessor>,
        options: EnumerationOptions,
        tracker: Arc<ScanTracker>,
    ) -> Self {
        Self {
            id,
            queue,
            cancel,
            source,
            processor,
            options,
            tracker,
            state: Arc::new(AtomicU8::new(WorkerState::Idle as u8)),
            completion: Arc::new(OnceLock::new()),
        }
    }

    /// Spawn the read loop and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> WorkerHandle {
        let id = self.id;
        let state = Arc::clone(&self.state);
        let completion = Arc::clone(&self.completion);

        state.store(WorkerState::Running as u8, Ordering::Release);
        let task = tokio::spawn(self.run());

        WorkerHandle {
            id,
            state,
            completion,
            task: Some(task),
        }
    }

    async fn run(self) -> WorkerExit {
        let mut guard = CompletionGuard {
            marker: Arc::clone(&self.completion),
            state: Arc::clone(&self.state),
            exit: WorkerExit::Faulted,
        };
        debug!(worker = self.id, "Worker starting");

        let mut dirs = 0u64;
        let exit = loop {
            if self.cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }

            let dir = match self.queue.dequeue(&self.cancel).await {
                Dequeued::Item(dir) => dir,
                Dequeued::Closed => break WorkerExit::Drained,
                Dequeued::Cancelled => break WorkerExit::Cancelled,
            };

            if self.queue.is_closed() {
                self.state.store(WorkerState::Draining as u8, Ordering::Release);
            }

            let outcome = {
                let source = Arc::clone(&self.source);
                let processor = Arc::clone(&self.processor);
                let cancel = self.cancel.clone();
                let tracker = Arc::clone(&self.tracker);
                let options = self.options;
                let dir = dir.clone();

                tokio::task::spawn_blocking(move || {
                    scan_directory(&dir, &*source, &*processor, &options, &cancel, &tracker)
                })
                .await
            };

            match outcome {
                Ok(DirectoryOutcome::Scanned { files }) => {
                    dirs += 1;
                    trace!(worker = self.id, path = %dir.display(), files, "Directory scanned");
                    self.tracker.record_dir(&dir, self.queue.len());
                }
                Ok(DirectoryOutcome::Interrupted { .. }) => break WorkerExit::Cancelled,
                Ok(DirectoryOutcome::ListingFailed) => {}
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    error!(worker = self.id, error = %e, "Directory task aborted");
                    break WorkerExit::Faulted;
                }
            }
        };

        guard.exit = exit;
        debug!(worker = self.id, dirs, exit = ?exit, "Worker finished");
        exit
    }
}

/// Handle to a started worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: usize,
    state: Arc<AtomicU8>,
    completion: Arc<OnceLock<WorkerExit>>,
    task: Option<JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
    /// Get worker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The completion marker: `Some` once the read loop has exited.
    pub fn exit(&self) -> Option<WorkerExit> {
        self.completion.get().copied()
    }

    /// Wait for the read loop to exit. Further calls return the same exit.
    pub async fn join(&mut self) -> WorkerExit {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(worker = self.id, error = %e, "Worker task failed");
            }
        }
        self.exit().unwrap_or(WorkerExit::Faulted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use dirfan_core::{FileRecord, ProcessError, ScanError};

    use crate::source::Listing;

    /// Directories and their files, all in memory.
    #[derive(Default)]
    struct MemorySource {
        files: HashMap<PathBuf, Vec<PathBuf>>,
    }

    impl MemorySource {
        fn with_dir(mut self, dir: &str, count: usize) -> Self {
            let files = (0..count)
                .map(|i| PathBuf::from(format!("{dir}/file{i}")))
                .collect();
            self.files.insert(PathBuf::from(dir), files);
            self
        }
    }

    impl DirectorySource for MemorySource {
        fn list_directories(
            &self,
            _root: &Path,
            _options: &EnumerationOptions,
        ) -> Result<Listing, ScanError> {
            Ok(self.files.keys().cloned().collect::<Vec<_>>().into())
        }

        fn list_files(
            &self,
            dir: &Path,
            _options: &EnumerationOptions,
        ) -> Result<Listing, ScanError> {
            self.files
                .get(dir)
                .cloned()
                .map(Listing::from)
                .ok_or_else(|| ScanError::NotFound {
                    path: dir.to_path_buf(),
                })
        }
    }

    /// Counts calls, fails on one path, cancels after a number of calls.
    #[derive(Default)]
    struct CountingProcessor {
        calls: AtomicUsize,
        fail_on: Option<PathBuf>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl FileProcessor for CountingProcessor {
        fn process(&self, path: &Path, id: &str) -> Result<FileRecord, ProcessError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(id, path.to_string_lossy());

            if let Some((limit, token)) = &self.cancel_after {
                if calls >= *limit {
                    token.cancel();
                }
            }
            if self.fail_on.as_deref() == Some(path) {
                return Err(ProcessError::other("injected failure"));
            }
            FileRecord::new(path, id, 0, std::time::UNIX_EPOCH)
                .ok_or_else(|| ProcessError::other("no file name"))
        }
    }

    fn tracker() -> ScanTracker {
        ScanTracker::new(None, 1, 100)
    }

    #[test]
    fn test_scan_directory_processes_every_file() {
        let source = MemorySource::default().with_dir("/d", 4);
        let processor = CountingProcessor::default();
        let tracker = tracker();

        let outcome = scan_directory(
            Path::new("/d"),
            &source,
            &processor,
            &EnumerationOptions::default(),
            &CancellationToken::new(),
            &tracker,
        );

        assert_eq!(outcome, DirectoryOutcome::Scanned { files: 4 });
        assert_eq!(processor.calls.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.stats().files_processed, 4);
    }

    #[test]
    fn test_scan_directory_swallows_file_errors() {
        let source = MemorySource::default().with_dir("/d", 3);
        let processor = CountingProcessor {
            fail_on: Some(PathBuf::from("/d/file1")),
            ..Default::default()
        };
        let tracker = tracker();

        let outcome = scan_directory(
            Path::new("/d"),
            &source,
            &processor,
            &EnumerationOptions::default(),
            &CancellationToken::new(),
            &tracker,
        );

        assert_eq!(outcome, DirectoryOutcome::Scanned { files: 3 });
        let stats = tracker.stats();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_failed, 1);
    }

    #[test]
    fn test_scan_directory_stops_mid_listing() {
        let cancel = CancellationToken::new();
        let source = MemorySource::default().with_dir("/d", 10);
        let processor = CountingProcessor {
            cancel_after: Some((3, cancel.clone())),
            ..Default::default()
        };
        let tracker = tracker();

        let outcome = scan_directory(
            Path::new("/d"),
            &source,
            &processor,
            &EnumerationOptions::default(),
            &cancel,
            &tracker,
        );

        assert_eq!(outcome, DirectoryOutcome::Interrupted { files: 3 });
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.stats().dirs_partial, 1);
    }

    #[test]
    fn test_scan_directory_records_listing_failure() {
        let source = MemorySource::default();
        let processor = CountingProcessor::default();
        let tracker = tracker();

        let outcome = scan_directory(
            Path::new("/missing"),
            &source,
            &processor,
            &EnumerationOptions::default(),
            &CancellationToken::new(),
            &tracker,
        );

        assert_eq!(outcome, DirectoryOutcome::ListingFailed);
        assert_eq!(tracker.stats().listing_failures, 1);
        assert_eq!(tracker.take_warnings().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_directory_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        use std::sync::Mutex;

        struct Recorder(Mutex<Vec<(PathBuf, String)>>);

        impl FileProcessor for Recorder {
            fn process(&self, path: &Path, id: &str) -> Result<FileRecord, ProcessError> {
                self.0.lock().unwrap().push((path.to_path_buf(), id.to_string()));
                FileRecord::new(path, id, 0, std::time::UNIX_EPOCH)
                    .ok_or_else(|| ProcessError::other("no file name"))
            }
        }

        let file = Path::new("/raw").join(OsStr::from_bytes(b"caf\xe9.txt"));
        let mut source = MemorySource::default();
        source.files.insert(PathBuf::from("/raw"), vec![file.clone()]);
        let recorder = Recorder(Mutex::new(Vec::new()));
        let tracker = tracker();

        let outcome = scan_directory(
            Path::new("/raw"),
            &source,
            &recorder,
            &EnumerationOptions::default(),
            &CancellationToken::new(),
            &tracker,
        );

        assert_eq!(outcome, DirectoryOutcome::Scanned { files: 1 });
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen[0].0, file);
        assert_eq!(seen[0].1, "/raw/caf\u{fffd}.txt");
        assert_eq!(tracker.stats().files_processed, 1);
    }

    fn worker(
        id: usize,
        queue: &Arc<PathQueue>,
        cancel: &CancellationToken,
        source: Arc<MemorySource>,
        processor: Arc<CountingProcessor>,
    ) -> ScanWorker {
        ScanWorker::new(
            id,
            Arc::clone(queue),
            cancel.clone(),
            source,
            processor,
            EnumerationOptions::default(),
            Arc::new(tracker()),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_drains_then_finishes() {
        let queue = Arc::new(PathQueue::new(8));
        let cancel = CancellationToken::new();
        let source = Arc::new(MemorySource::default().with_dir("/a", 2).with_dir("/b", 3));
        let processor = Arc::new(CountingProcessor::default());

        let mut handle = worker(0, &queue, &cancel, source, Arc::clone(&processor)).start();
        assert!(handle.exit().is_none());

        queue.enqueue("/a".into(), &cancel).await.unwrap();
        queue.enqueue("/b".into(), &cancel).await.unwrap();
        queue.close();

        let exit = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("worker did not finish");
        assert_eq!(exit, WorkerExit::Drained);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_stops_on_cancel_while_waiting() {
        let queue = Arc::new(PathQueue::new(8));
        let cancel = CancellationToken::new();
        let mut handle = worker(
            3,
            &queue,
            &cancel,
            Arc::new(MemorySource::default()),
            Arc::new(CountingProcessor::default()),
        )
        .start();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.state(), WorkerState::Running);
        assert_eq!(handle.id(), 3);

        cancel.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("worker ignored cancellation");
        assert_eq!(exit, WorkerExit::Cancelled);
        assert!(!queue.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_completion_marker_is_set_on_done() {
        let queue = Arc::new(PathQueue::new(1));
        let cancel = CancellationToken::new();
        let mut handle = worker(
            0,
            &queue,
            &cancel,
            Arc::new(MemorySource::default()),
            Arc::new(CountingProcessor::default()),
        )
        .start();

        queue.close();
        for _ in 0..500 {
            if handle.exit().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(handle.exit(), Some(WorkerExit::Drained));
        assert_eq!(handle.state(), WorkerState::Done);
        assert_eq!(handle.join().await, WorkerExit::Drained);
        assert_eq!(handle.join().await, WorkerExit::Drained);
    }
}
