//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 16;

/// Default capacity of the directory queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50_000;

/// Largest queue capacity the channel behind the queue can represent.
pub const MAX_QUEUE_CAPACITY: usize = usize::MAX >> 3;

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Number of concurrent scan workers.
    #[builder(default = "DEFAULT_WORKERS")]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of directory paths buffered between producer and workers.
    #[builder(default = "DEFAULT_QUEUE_CAPACITY")]
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Skip entries whose name starts with `.`.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub skip_hidden: bool,

    /// Skip entries carrying the system attribute (Windows only).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub skip_system: bool,

    /// Keep going past entries that cannot be read instead of failing.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub ignore_inaccessible: bool,

    /// Scan the files directly inside the root, not only its subdirectories.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_root: bool,

    /// Publish a progress snapshot every this many directories.
    #[builder(default = "256")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Maximum number of warnings kept in the report. Counts stay exact.
    #[builder(default = "1000")]
    #[serde(default = "default_max_warnings")]
    pub max_warnings: usize,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_progress_interval() -> u64 {
    256
}

fn default_max_warnings() -> usize {
    1000
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.workers == Some(0) {
            return Err("Worker count must be at least 1".to_string());
        }
        match self.queue_capacity {
            Some(0) => return Err("Queue capacity must be at least 1".to_string()),
            Some(capacity) if capacity > MAX_QUEUE_CAPACITY => {
                return Err(format!("Queue capacity must be at most {MAX_QUEUE_CAPACITY}"));
            }
            _ => {}
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config with default tuning for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            skip_hidden: true,
            skip_system: true,
            ignore_inaccessible: true,
            include_root: true,
            progress_interval: 256,
            max_warnings: 1000,
        }
    }

    /// Options for the recursive directory enumeration.
    pub fn tree_options(&self) -> EnumerationOptions {
        EnumerationOptions {
            skip_hidden: self.skip_hidden,
            skip_system: self.skip_system,
            ignore_inaccessible: self.ignore_inaccessible,
            recurse: true,
        }
    }

    /// Options for listing the files of a single directory.
    pub fn listing_options(&self) -> EnumerationOptions {
        EnumerationOptions {
            recurse: false,
            ..self.tree_options()
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Flags handed to the filesystem enumeration routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationOptions {
    /// Skip entries whose name starts with `.`.
    pub skip_hidden: bool,
    /// Skip entries carrying the system attribute.
    pub skip_system: bool,
    /// Skip unreadable entries instead of failing the whole call.
    pub ignore_inaccessible: bool,
    /// Descend into subdirectories.
    pub recurse: bool,
}

impl EnumerationOptions {
    /// Check if an entry name is hidden and should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        self.skip_hidden && name.starts_with('.')
    }
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        ScanConfig::default().tree_options()
    }
}
