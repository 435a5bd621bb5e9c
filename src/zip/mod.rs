//! ZIP container writing.
//!
//! ## Architecture
//!
//! - [`structures`]: records of the ZIP format (headers, descriptors, EOCD)
//!   and their byte layout
//! - [`writer`]: [`ArchiveWriter`], which streams deflate members into a file
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The writer emits a data descriptor after each member instead of seeking
//! back to patch the local header, and only writes the Central Directory in
//! [`ArchiveWriter::finish`]. ZIP64 records are added when offsets, sizes or
//! the entry count outgrow the classic fields.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod structures;
mod writer;

pub use structures::{CompressionMethod, DosDateTime};
pub use writer::{ArchiveMember, ArchiveWriter};
