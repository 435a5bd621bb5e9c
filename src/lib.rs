//! # zipdirs
//!
//! Compress each directory to its own ZIP file.
//!
//! Given one or more directories, zipdirs writes one archive per directory
//! (or, with subdirectory iteration, one archive per immediate child
//! directory) into an output directory. Member names can be stored in a
//! legacy charset for tools that do not understand UTF-8 names.
//!
//! ## Features
//!
//! - Member paths with or without the directory's own name as prefix
//! - Deflate compression, ZIP64 for large archives
//! - Interactive or forced overwrite of existing archives
//! - Optional filename charset conversion (`charset` feature)
//!
//! ## Example
//!
//! ```no_run
//! use zipdirs::{charset, run_batch, Config, RootNaming};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config {
//!         root_naming: RootNaming::OmitRoot,
//!         force: true,
//!         ..Config::default()
//!     }
//!     .with_destination("archives");
//!
//!     let transcoder = charset::select(&config.charset)?;
//!     // Never overwrite without -o: answer every question with its default.
//!     let mut confirm = |_: &str, default_answer: bool| default_answer;
//!     let summary = run_batch(&["photos", "music"], &config, transcoder.as_ref(), &mut confirm)?;
//!
//!     for archive in &summary.created {
//!         println!("{}", archive.display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod charset;
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod overwrite;
pub mod walk;
pub mod zip;

pub use batch::{run_batch, BatchDriver, BatchSummary};
pub use cli::Cli;
pub use config::{BatchMode, Config, EmptyPolicy, RootNaming};
pub use error::{ArchiveError, ConflictKind, Result};
pub use job::{DirectoryJob, JobOutcome, JobRunner};
pub use overwrite::{Confirm, TerminalPrompt};
pub use walk::{TreeWalker, WalkEntry};
pub use crate::zip::{ArchiveMember, ArchiveWriter};
