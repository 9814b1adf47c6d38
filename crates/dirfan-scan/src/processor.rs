//! Per-file processing step.

use std::path::Path;

use dirfan_core::{FileRecord, ProcessError};

/// Work performed once for every discovered file.
///
/// Called from blocking worker threads. Failures are counted and logged by
/// the caller but never stop the scan.
pub trait FileProcessor: Send + Sync {
    /// Build a record for `path`, filed under `id`.
    ///
    /// The scanners pass the path itself as `id`, converted lossily: a file
    /// name that is not valid UTF-8 gets U+FFFD in the id while `path` stays
    /// exact. Use `path` when the file has to be opened.
    fn process(&self, path: &Path, id: &str) -> Result<FileRecord, ProcessError>;
}

/// Default processor: reads file metadata into a [`FileRecord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBuilder;

impl RecordBuilder {
    /// Create a new record builder.
    pub fn new() -> Self {
        Self
    }
}

impl FileProcessor for RecordBuilder {
    fn process(&self, path: &Path, id: &str) -> Result<FileRecord, ProcessError> {
        let metadata = std::fs::metadata(path).map_err(|source| ProcessError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;

        FileRecord::new(
            path,
            id,
            metadata.len(),
            metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
        )
        .ok_or_else(|| ProcessError::NotAFile {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builds_record_from_metadata() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("track.MP3");
        fs::write(&path, "0123456789").unwrap();

        let id = path.to_string_lossy().to_string();
        let record = RecordBuilder::new().process(&path, &id).unwrap();

        assert_eq!(record.size, 10);
        assert_eq!(record.filename.as_str(), "track.MP3");
        assert_eq!(record.extension.as_deref(), Some("mp3"));
        assert_eq!(record.id.as_str(), id);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vanished.txt");

        let err = RecordBuilder::new().process(&path, "vanished").unwrap_err();
        assert!(matches!(err, ProcessError::Metadata { .. }));
    }
}
