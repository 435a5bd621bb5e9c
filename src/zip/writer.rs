//! Streaming ZIP writer.
//!
//! Each member is written as local header, compressed data and a data
//! descriptor, so content is never buffered and the output never needs to
//! seek. [`ArchiveWriter::finish`] appends the central directory; until it
//! runs, the container is unreadable by most tools.

use chrono::{DateTime, Local};
use flate2::write::DeflateEncoder;
use flate2::{Compression, CrcReader};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use super::structures::{
    extended_timestamp, CentralDirectoryHeader, CompressionMethod, DataDescriptor, DosDateTime,
    EndOfCentralDirectory, LocalFileHeader, Zip64EOCD, Zip64EOCDLocator, FLAG_DATA_DESCRIPTOR,
    FLAG_UTF8,
};

/// Metadata of one member about to be written.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Stored name bytes, already in the target charset.
    pub name: Vec<u8>,
    pub modified: DateTime<Local>,
    pub compression_method: CompressionMethod,
    /// The name bytes are not UTF-8.
    pub non_utf8: bool,
}

impl ArchiveMember {
    /// A deflate member stamped with the current time.
    pub fn new(name: impl Into<Vec<u8>>, non_utf8: bool) -> Self {
        Self {
            name: name.into(),
            modified: Local::now(),
            compression_method: CompressionMethod::Deflate,
            non_utf8,
        }
    }

    fn flags(&self) -> u16 {
        // Plain ASCII names read the same either way; only flag real UTF-8.
        if !self.non_utf8 && !self.name.is_ascii() {
            FLAG_DATA_DESCRIPTOR | FLAG_UTF8
        } else {
            FLAG_DATA_DESCRIPTOR
        }
    }
}

/// Tracks the absolute offset of everything written.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct ArchiveWriter<W: Write> {
    out: CountingWriter<W>,
    entries: Vec<CentralDirectoryHeader>,
    level: Compression,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Creates (or truncates) the archive file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: CountingWriter { inner: out, count: 0 },
            entries: Vec::new(),
            level: Compression::default(),
        }
    }

    /// Number of members completely written so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compresses everything `content` yields into a new member.
    ///
    /// Returns the uncompressed size. On error the member is left out of the
    /// central directory.
    pub fn write_member<R: Read + ?Sized>(
        &mut self,
        member: &ArchiveMember,
        content: &mut R,
    ) -> io::Result<u64> {
        let lfh_offset = self.out.count;
        let modified = DosDateTime::from_datetime(&member.modified);
        let extra = extended_timestamp(member.modified.timestamp().clamp(0, u32::MAX as i64) as u32);
        let flags = member.flags();

        LocalFileHeader {
            flags,
            compression_method: member.compression_method,
            modified,
            file_name: &member.name,
            extra: &extra,
        }
        .write_to(&mut self.out)?;

        let data_offset = self.out.count;
        let mut source = CrcReader::new(content);
        // `Crc::amount` wraps at 4 GiB; the count from `io::copy` does not.
        let uncompressed_size = match member.compression_method {
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(&mut self.out, self.level);
                let read = io::copy(&mut source, &mut encoder)?;
                encoder.finish()?;
                read
            }
            CompressionMethod::Stored => io::copy(&mut source, &mut self.out)?,
            CompressionMethod::Unknown(method) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported compression method: {method}"),
                ));
            }
        };

        let descriptor = DataDescriptor {
            crc32: source.crc().sum(),
            compressed_size: self.out.count - data_offset,
            uncompressed_size,
        };
        descriptor.write_to(&mut self.out)?;

        self.entries.push(CentralDirectoryHeader {
            flags,
            compression_method: member.compression_method,
            modified,
            crc32: descriptor.crc32,
            compressed_size: descriptor.compressed_size,
            uncompressed_size: descriptor.uncompressed_size,
            lfh_offset,
            file_name: member.name.clone(),
            extra,
        });

        Ok(descriptor.uncompressed_size)
    }

    /// Writes the central directory and end records, then flushes.
    pub fn finish(mut self) -> io::Result<W> {
        let cd_offset = self.out.count;
        for header in &self.entries {
            header.write_to(&mut self.out)?;
        }
        let cd_size = self.out.count - cd_offset;
        let entries = self.entries.len() as u64;

        let eocd = EndOfCentralDirectory::new(entries, cd_size, cd_offset);
        if eocd.is_zip64() {
            let eocd64_offset = self.out.count;
            Zip64EOCD::new(entries, cd_size, cd_offset).write_to(&mut self.out)?;
            Zip64EOCDLocator {
                disk_with_eocd64: 0,
                eocd64_offset,
                total_disks: 1,
            }
            .write_to(&mut self.out)?;
        }
        eocd.write_to(&mut self.out)?;

        self.out.flush()?;
        Ok(self.out.inner)
    }
}
