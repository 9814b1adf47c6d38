//! Filesystem enumeration.
//!
//! The pipeline only needs two blocking calls from the filesystem: list
//! every directory below a root, and list the files directly inside one
//! directory. [`DirectorySource`] is that seam; [`FsDirectorySource`] is the
//! real implementation on top of jwalk and `std::fs`.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use tracing::debug;

use dirfan_core::{EnumerationOptions, ScanError, ScanWarning};

/// Paths returned by one enumeration call.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Paths in enumeration order.
    pub paths: Vec<PathBuf>,
    /// Entries left out because they could not be read. Only filled when
    /// `ignore_inaccessible` is on; otherwise such an entry fails the call.
    pub skipped: Vec<ScanWarning>,
}

impl Listing {
    fn skip(&mut self, path: PathBuf, error: impl Display) {
        let error = error.to_string();
        debug!(path = %path.display(), error = %error, "Skipping inaccessible entry");
        self.skipped.push(ScanWarning::inaccessible(path, error));
    }
}

impl From<Vec<PathBuf>> for Listing {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            skipped: Vec::new(),
        }
    }
}

/// Blocking enumeration routines used by the producer and the workers.
pub trait DirectorySource: Send + Sync {
    /// List every directory below `root`, in enumeration order. `root` itself is not included.
    ///
    /// Fails when the root cannot be read, whatever the options say, and
    /// when a deeper entry cannot be read and `options.ignore_inaccessible`
    /// is off.
    fn list_directories(&self, root: &Path, options: &EnumerationOptions)
    -> Result<Listing, ScanError>;

    /// List the files directly inside `dir`, in path order.
    fn list_files(&self, dir: &Path, options: &EnumerationOptions) -> Result<Listing, ScanError>;
}

/// [`DirectorySource`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectorySource;

impl FsDirectorySource {
    /// Create a new filesystem source.
    pub fn new() -> Self {
        Self
    }
}

impl DirectorySource for FsDirectorySource {
    fn list_directories(
        &self,
        root: &Path,
        options: &EnumerationOptions,
    ) -> Result<Listing, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| ScanError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        // jwalk never yields the root entry with min_depth(1), so a root it
        // cannot read would look like an empty tree
        std::fs::read_dir(root).map_err(|e| ScanError::io(root, e))?;

        let skip_system = options.skip_system && cfg!(windows);
        let walker = WalkDir::new(root)
            .skip_hidden(options.skip_hidden)
            .follow_links(false)
            .sort(true)
            .min_depth(1)
            .max_depth(if options.recurse { usize::MAX } else { 1 })
            .process_read_dir(move |_depth, _path, _state, children| {
                // Drop system entries before jwalk descends into them
                if skip_system {
                    children.retain(|child| match child {
                        Ok(entry) => !entry
                            .metadata()
                            .map(|m| is_system(&m))
                            .unwrap_or(false),
                        Err(_) => true,
                    });
                }
            });

        let mut listing = Listing::default();
        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    if options.ignore_inaccessible {
                        listing.skip(path, &err);
                        continue;
                    }
                    return Err(walk_error(path, &err));
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if let Some(err) = &entry.read_children_error {
                if options.ignore_inaccessible {
                    listing.skip(path, err);
                    continue;
                }
                return Err(walk_error(path, err));
            }
            listing.paths.push(path);
        }

        Ok(listing)
    }

    fn list_files(&self, dir: &Path, options: &EnumerationOptions) -> Result<Listing, ScanError> {
        let read_dir = std::fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))?;

        let mut listing = Listing::default();
        for entry_result in read_dir {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) if options.ignore_inaccessible => {
                    listing.skip(dir.to_path_buf(), err);
                    continue;
                }
                Err(err) => return Err(ScanError::io(dir, err)),
            };

            let name = entry.file_name();
            if options.should_skip_hidden(&name.to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            // A symlink counts as a file when its target is one
            let metadata = match entry.file_type() {
                Ok(file_type) if file_type.is_symlink() => std::fs::metadata(&path),
                _ => entry.metadata(),
            };
            let metadata = match metadata {
                Ok(m) => m,
                Err(err) if options.ignore_inaccessible => {
                    listing.skip(path, err);
                    continue;
                }
                Err(err) => return Err(ScanError::io(path, err)),
            };

            if !metadata.is_file() || (options.skip_system && is_system(&metadata)) {
                continue;
            }

            listing.paths.push(path);
        }

        listing.paths.sort();
        Ok(listing)
    }
}

fn walk_error(path: PathBuf, err: &jwalk::Error) -> ScanError {
    let kind = err
        .io_error()
        .map(std::io::Error::kind)
        .unwrap_or(std::io::ErrorKind::Other);
    ScanError::io(path, std::io::Error::new(kind, err.to_string()))
}

/// Check for the system attribute (Windows).
#[cfg(windows)]
fn is_system(metadata: &std::fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
}

#[cfg(not(windows))]
fn is_system(_metadata: &std::fs::Metadata) -> bool {
    false // No system attribute outside Windows
}
