//! Error types shared by every stage of an archive job.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::charset::EncodingError;

/// Result alias used throughout the crate.
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// Why an output path cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A directory sits where the archive file should be written.
    DirectoryExists,
    /// The output directory path exists but is not a directory.
    NotADirectory,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::DirectoryExists => f.write_str("a directory with that name already exists"),
            ConflictKind::NotADirectory => f.write_str("output path is not a directory"),
        }
    }
}

/// Every failure an archive job or batch can surface.
///
/// Errors are never retried; the first one stops the batch and is reported
/// verbatim at the process boundary.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Listing, opening, reading or writing failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output path collides with something that cannot be overwritten.
    #[error("cannot create {}: {kind}", path.display())]
    Conflict { path: PathBuf, kind: ConflictKind },

    /// A member name could not be transcoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The configuration or an input argument is unusable.
    #[error("{0}")]
    Config(String),

    /// The user declined to create the output directory.
    #[error("stopped: output directory {} does not exist", path.display())]
    Cancelled { path: PathBuf },
}

impl ArchiveError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn conflict(path: impl AsRef<Path>, kind: ConflictKind) -> Self {
        ArchiveError::Conflict {
            path: path.as_ref().to_path_buf(),
            kind,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ArchiveError::Config(message.into())
    }
}

/// Extension for attaching a path to `std::io` results.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| ArchiveError::io(path, source))
    }
}
