//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that end a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A path was pushed into the queue after it was closed.
    #[error("Queue closed, cannot enqueue {path}")]
    QueueClosed { path: PathBuf },

    /// A worker task died without reaching its normal exit.
    #[error("Worker {id} failed: {message}")]
    WorkerFailed { id: usize, message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Failure inside the per-file step. Never escapes a worker.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Reading the file's metadata failed.
    #[error("Cannot read metadata of {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path has no usable file name.
    #[error("Not a file path: {path}")]
    NotAFile { path: PathBuf },

    /// Anything else a processor wants to report.
    #[error("{message}")]
    Other { message: String },
}

impl ProcessError {
    /// Create a free-form processing error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Listing the files of one directory failed.
    ListingFailed,
    /// The per-file step failed.
    FileFailed,
    /// An entry was skipped because it could not be read.
    Inaccessible,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a directory whose listing failed.
    pub fn listing_failed(path: impl Into<PathBuf>, error: &ScanError) -> Self {
        Self::new(path, format!("Listing failed: {error}"), WarningKind::ListingFailed)
    }

    /// Create a warning for an entry the enumeration could not read and left out.
    pub fn inaccessible(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::new(path, format!("Skipped: {error}"), WarningKind::Inaccessible)
    }

    /// Create a warning for a file the per-file step rejected.
    pub fn file_failed(path: impl Into<PathBuf>, error: &ProcessError) -> Self {
        Self::new(path, format!("Processing failed: {error}"), WarningKind::FileFailed)
    }
}
