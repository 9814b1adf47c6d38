//! Bounded queue of directory paths.
//!
//! A single producer pushes paths in, any number of workers pull them out.
//! Pushing waits while the queue is full and pulling waits while it is
//! empty, so the producer can never run further ahead of the workers than
//! the configured capacity. Closing the queue lets workers drain what is
//! left and then observe [`Dequeued::Closed`] instead of waiting forever.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;

use dirfan_core::{MAX_QUEUE_CAPACITY, ScanError};

/// Result of pulling from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeued {
    /// The next directory to scan.
    Item(PathBuf),
    /// The queue is closed and fully drained.
    Closed,
    /// The cancellation token was raised while waiting.
    Cancelled,
}

/// Result of a push that did not violate the queue's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The path is in the queue.
    Accepted,
    /// The cancellation token was raised while waiting for room; the path was dropped.
    Cancelled,
}

/// Fixed-capacity FIFO of directory paths shared by the producer and all workers.
#[derive(Debug)]
pub struct PathQueue {
    /// Present until the queue is closed.
    sender: Mutex<Option<mpsc::Sender<PathBuf>>>,
    receiver: AsyncMutex<mpsc::Receiver<PathBuf>>,
    capacity: usize,
}

impl PathQueue {
    /// Create an open, empty queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or above [`MAX_QUEUE_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        assert!(
            capacity <= MAX_QUEUE_CAPACITY,
            "queue capacity must be at most {MAX_QUEUE_CAPACITY}"
        );
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender: Mutex::new(Some(sender)),
            receiver: AsyncMutex::new(receiver),
            capacity,
        }
    }

    /// Get queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of paths currently buffered.
    ///
    /// Exact while the queue is open. After closing it reports what can be
    /// observed without waiting for a busy consumer, which may be zero.
    pub fn len(&self) -> usize {
        if let Some(sender) = self.sender.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return sender.max_capacity() - sender.capacity();
        }
        self.receiver.try_lock().map(|rx| rx.len()).unwrap_or(0)
    }

    /// Check if the queue holds no paths.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Push a path, waiting while the queue is full.
    ///
    /// Fails with [`ScanError::QueueClosed`] if the queue was closed before
    /// the call. The wait gives up with [`Enqueued::Cancelled`] once `cancel`
    /// is raised.
    pub async fn enqueue(
        &self,
        path: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<Enqueued, ScanError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            return Err(ScanError::QueueClosed { path });
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(Enqueued::Cancelled),
            sent = sender.send(path) => match sent {
                Ok(()) => Ok(Enqueued::Accepted),
                Err(mpsc::error::SendError(path)) => Err(ScanError::QueueClosed { path }),
            },
        }
    }

    /// Pull the next path, waiting while the queue is empty and open.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Dequeued {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Dequeued::Cancelled,
            next = async { self.receiver.lock().await.recv().await } => match next {
                Some(path) => Dequeued::Item(path),
                None => Dequeued::Closed,
            },
        }
    }

    /// Signal that no more paths will arrive.
    ///
    /// Paths already buffered stay available to [`dequeue`](Self::dequeue).
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}
