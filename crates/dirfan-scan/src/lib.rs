//! Bounded fan-out scanning engine for dirfan.
//!
//! # Overview
//!
//! `dirfan-scan` walks a directory tree in two stages. A single producer
//! enumerates every directory under the root and pushes the paths into a
//! bounded queue; a fixed pool of workers pulls paths out and lists the
//! files in each one. Key properties:
//!
//! - **Backpressure**: the producer waits while the queue is full, so memory
//!   stays bounded by the queue capacity however large the tree is
//! - **Clean termination**: the queue is always closed, and the scan returns
//!   only after every worker has exited
//! - **Cooperative cancellation** through a [`CancellationToken`]
//! - **Best effort**: a failing file or directory is recorded, not fatal
//!
//! # Example
//!
//! ```rust,no_run
//! use dirfan_scan::{FanoutScanner, ScanConfig};
//!
//! # async fn run() -> Result<(), dirfan_scan::ScanError> {
//! let config = ScanConfig::builder()
//!     .root("/srv/share")
//!     .workers(16usize)
//!     .queue_capacity(50_000usize)
//!     .build()
//!     .unwrap();
//!
//! let report = FanoutScanner::new().scan(&config, None).await?;
//! println!("{} files in {:?}", report.stats.files_processed, report.duration);
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use dirfan_scan::FanoutScanner;
//!
//! let scanner = FanoutScanner::new();
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Scanned {} directories", progress.dirs_scanned);
//!     }
//! });
//! ```

mod linear;
mod processor;
mod producer;
mod progress;
mod queue;
mod scanner;
mod source;
mod worker;

pub use linear::LinearScanner;
pub use processor::{FileProcessor, RecordBuilder};
pub use progress::ScanProgress;
pub use queue::{Dequeued, Enqueued, PathQueue};
pub use scanner::FanoutScanner;
pub use source::{DirectorySource, FsDirectorySource, Listing};

pub use tokio_util::sync::CancellationToken;

// Re-export core types for convenience
pub use dirfan_core::{
    EnumerationOptions, FileRecord, MAX_QUEUE_CAPACITY, ProcessError, ScanConfig, ScanError,
    ScanOutcome, ScanReport, ScanStats, ScanWarning, WarningKind,
};
