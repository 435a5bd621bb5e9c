//! Recursive enumeration of a directory tree into archive paths.
//!
//! [`TreeWalker`] visits every descendant of a root depth-first, pre-order,
//! and pairs each on-disk path with its logical archive path: the path
//! relative to the root, `/`-separated, joined onto an archive prefix.
//!
//! Symlinks are followed. A symlink that leads back into one of its own
//! ancestors is reported as an error instead of being recursed into.
//!
//! The walk is lazy and stops at the first error; callers must not continue
//! after an `Err` item.

use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::charset::EncodingError;
use crate::error::{ArchiveError, Result};

/// One visited filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub disk_path: PathBuf,
    /// Forward-slash path inside the archive.
    pub archive_path: String,
    pub is_directory: bool,
}

pub struct TreeWalker {
    inner: walkdir::IntoIter,
    root: PathBuf,
    prefix: String,
    failed: bool,
}

impl TreeWalker {
    /// Walks the descendants of `root` (not `root` itself), joining every
    /// relative path onto `archive_prefix`. An empty prefix stores paths
    /// relative to `root`.
    pub fn new(root: impl AsRef<Path>, archive_prefix: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        let inner = WalkDir::new(&root)
            .follow_links(true)
            .min_depth(1)
            .into_iter();

        Self {
            inner,
            root,
            prefix: archive_prefix.trim_end_matches('/').to_string(),
            failed: false,
        }
    }

    fn archive_path(&self, disk_path: &Path) -> Result<String> {
        let relative = disk_path
            .strip_prefix(&self.root)
            .map_err(|_| ArchiveError::config(format!(
                "{} is outside of {}",
                disk_path.display(),
                self.root.display()
            )))?;

        let mut archive_path = self.prefix.clone();
        for component in relative.components() {
            let Component::Normal(name) = component else {
                continue;
            };
            let name = name
                .to_str()
                .ok_or_else(|| EncodingError::NonUtf8Path(disk_path.to_path_buf()))?;
            if !archive_path.is_empty() {
                archive_path.push('/');
            }
            archive_path.push_str(name);
        }
        Ok(archive_path)
    }
}

impl Iterator for TreeWalker {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.failed = true;
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(ArchiveError::io(path, io::Error::from(err))));
                }
            };

            let file_type = entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                tracing::warn!(path = %entry.path().display(), "skipping special file");
                continue;
            }

            return Some(match self.archive_path(entry.path()) {
                Ok(archive_path) => Ok(WalkEntry {
                    disk_path: entry.into_path(),
                    archive_path,
                    is_directory: file_type.is_dir(),
                }),
                Err(err) => {
                    self.failed = true;
                    Err(err)
                }
            });
        }
    }
}
