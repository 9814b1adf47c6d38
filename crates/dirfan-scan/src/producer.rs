//! Directory producer.
//!
//! Enumerates the tree once, streams every directory into the queue and
//! closes it. The queue is closed on every exit path, including failure
//! and panic, so workers waiting on it always wake up.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dirfan_core::{EnumerationOptions, ScanError};

use crate::progress::ScanTracker;
use crate::queue::{Enqueued, PathQueue};
use crate::source::DirectorySource;

/// What the producer managed to push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production {
    /// Paths accepted by the queue.
    pub enqueued: u64,
    /// True if cancellation stopped the producer before the last path.
    pub cancelled: bool,
}

/// Closes the queue when dropped.
struct CloseOnDrop<'a>(&'a PathQueue);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if self.0.close() {
            debug!("Directory queue closed");
        }
    }
}

/// Enumerate `root` and feed every directory into `queue`, then close it.
///
/// The enumeration is a single blocking call and does not look at
/// `cancel`; only the waits on a full queue do. With `include_root` the root
/// itself is pushed ahead of its subdirectories.
pub(crate) async fn produce(
    root: &Path,
    queue: &PathQueue,
    source: Arc<dyn DirectorySource>,
    options: EnumerationOptions,
    include_root: bool,
    cancel: &CancellationToken,
    tracker: &ScanTracker,
) -> Result<Production, ScanError> {
    let _close = CloseOnDrop(queue);

    info!(root = %root.display(), "Enumerating directories");

    let joined = {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || source.list_directories(&root, &options)).await
    };
    let listing = match joined {
        Ok(result) => result?,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => return Err(ScanError::io(root, std::io::Error::other(e.to_string()))),
    };

    tracker.record_skipped(listing.skipped);
    let directories = listing.paths;
    let total = directories.len() as u64 + u64::from(include_root);
    tracker.record_enumerated(total);
    info!(found = total, "Enumerated directories");

    let paths = include_root
        .then(|| root.to_path_buf())
        .into_iter()
        .chain(directories);

    let mut enqueued = 0u64;
    for path in paths {
        match queue.enqueue(path, cancel).await? {
            Enqueued::Accepted => enqueued += 1,
            Enqueued::Cancelled => {
                info!(enqueued, total, "Producer stopped by cancellation");
                return Ok(Production {
                    enqueued,
                    cancelled: true,
                });
            }
        }
    }

    debug!(enqueued, "Queue filled");
    Ok(Production {
        enqueued,
        cancelled: false,
    })
}
