//! Per-file records.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A file discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Identifier the record was requested under. The full path by default.
    pub id: CompactString,
    /// Full path of the file.
    pub path: PathBuf,
    /// File name without the directory part.
    pub filename: CompactString,
    /// Lowercased extension, if any.
    pub extension: Option<CompactString>,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl FileRecord {
    /// Build a record from its parts. Returns `None` when the path has no file name.
    pub fn new(path: &Path, id: impl Into<CompactString>, size: u64, modified: SystemTime) -> Option<Self> {
        let filename = path.file_name()?.to_string_lossy();
        let extension = path
            .extension()
            .map(|ext| CompactString::new(ext.to_string_lossy().to_lowercase()));

        Some(Self {
            id: id.into(),
            path: path.to_path_buf(),
            filename: CompactString::new(filename),
            extension,
            size,
            modified,
        })
    }
}
