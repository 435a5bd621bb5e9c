//! Run configuration, built once and shared by reference.

use std::path::{Path, PathBuf};

use crate::charset::UTF8;

/// Whether member paths start with the source directory's own name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootNaming {
    /// `A/sub/y.txt` is stored as `sub/y.txt`.
    OmitRoot,
    /// `A/sub/y.txt` is stored as `A/sub/y.txt`.
    #[default]
    KeepRoot,
}

/// How the target arguments map to jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Each target is archived as a whole.
    #[default]
    Simple,
    /// Each immediate child directory of a target is archived separately.
    IterateChildren,
}

/// Treatment of child directories with no entries in [`BatchMode::IterateChildren`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    #[default]
    SkipEmpty,
    IncludeEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root_naming: RootNaming,
    pub mode: BatchMode,
    pub empty_policy: EmptyPolicy,
    /// Suppress progress output.
    pub quiet: bool,
    /// Overwrite existing archives and create the destination without asking.
    pub force: bool,
    /// Directory archives are written to; read it through [`Config::destination`].
    pub destination: PathBuf,
    /// Charset of member names in created archives.
    pub charset: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_naming: RootNaming::default(),
            mode: BatchMode::default(),
            empty_policy: EmptyPolicy::default(),
            quiet: false,
            force: false,
            destination: PathBuf::from("."),
            charset: UTF8.to_string(),
        }
    }
}

impl Config {
    /// Sets the directory archives are written to. An empty path means the
    /// current directory.
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    /// The output directory, `.` when none was given.
    pub fn destination(&self) -> &Path {
        if self.destination.as_os_str().is_empty() {
            Path::new(".")
        } else {
            &self.destination
        }
    }
}
