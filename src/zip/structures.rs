use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, Timelike};
use std::io::{self, Write};

/// Value stored in a 32-bit field whose real value lives in the ZIP64 extra.
pub const ZIP64_MARKER_32: u32 = 0xFFFFFFFF;
/// Value stored in a 16-bit count whose real value lives in the ZIP64 end record.
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// Version needed for deflate members.
pub const VERSION_DEFAULT: u16 = 20;
/// Version needed once ZIP64 fields are present.
pub const VERSION_ZIP64: u16 = 45;
/// Upper byte of "version made by": Unix.
pub const CREATOR_UNIX: u16 = 3;

/// General purpose flag: CRC and sizes follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag (EFS): name is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

pub const EXTRA_ZIP64: u16 = 0x0001;
pub const EXTRA_EXTENDED_TIMESTAMP: u16 = 0x5455;

/// Regular file, rw-r--r--, in the high half of the external attributes.
pub const UNIX_FILE_ATTRIBUTES: u32 = 0o100644 << 16;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// MS-DOS date and time pair used by local and central headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Encodes a calendar time. Years outside 1980..=2107 are clamped.
    pub fn from_datetime<T: Datelike + Timelike>(dt: &T) -> Self {
        let year = dt.year().clamp(1980, 2107) as u16;
        let date = ((year - 1980) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time =
            ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
        Self { time, date }
    }
}

/// Extended timestamp extra field (0x5455) carrying only the mtime.
pub fn extended_timestamp(unix_mtime: u32) -> Vec<u8> {
    let mut extra = Vec::with_capacity(9);
    extra.extend_from_slice(&EXTRA_EXTENDED_TIMESTAMP.to_le_bytes());
    extra.extend_from_slice(&5u16.to_le_bytes());
    extra.push(0x01);
    extra.extend_from_slice(&unix_mtime.to_le_bytes());
    extra
}

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Local header as written before each member's data.
///
/// Members are streamed, so CRC and sizes are zero here and the
/// [`FLAG_DATA_DESCRIPTOR`] bit is set.
pub struct LocalFileHeader<'a> {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub file_name: &'a [u8],
    pub extra: &'a [u8],
}

impl LocalFileHeader<'_> {
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_DEFAULT)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(0)?; // crc32
        out.write_u32::<LittleEndian>(0)?; // compressed size
        out.write_u32::<LittleEndian>(0)?; // uncompressed size
        out.write_u16::<LittleEndian>(field_len(self.file_name.len())?)?;
        out.write_u16::<LittleEndian>(field_len(self.extra.len())?)?;
        out.write_all(self.file_name)?;
        out.write_all(self.extra)
    }
}

/// Data descriptor written after each member's data.
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";

    pub fn is_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_MARKER_32 as u64
            || self.uncompressed_size >= ZIP64_MARKER_32 as u64
    }

    /// Writes the descriptor, with 64-bit sizes when either size overflows.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<u64> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        if self.is_zip64() {
            out.write_u64::<LittleEndian>(self.compressed_size)?;
            out.write_u64::<LittleEndian>(self.uncompressed_size)?;
            Ok(24)
        } else {
            out.write_u32::<LittleEndian>(self.compressed_size as u32)?;
            out.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
            Ok(16)
        }
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Central directory record for one written member.
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub lfh_offset: u64,
    pub file_name: Vec<u8>,
    pub extra: Vec<u8>,
}

impl CentralDirectoryHeader {
    /// ZIP64 extended information, holding only the overflowing fields.
    fn zip64_extra(&self) -> Vec<u8> {
        let mut values = Vec::new();
        for value in [self.uncompressed_size, self.compressed_size, self.lfh_offset] {
            if value >= ZIP64_MARKER_32 as u64 {
                values.extend_from_slice(&value.to_le_bytes());
            }
        }
        if values.is_empty() {
            return values;
        }

        let mut extra = Vec::with_capacity(4 + values.len());
        extra.extend_from_slice(&EXTRA_ZIP64.to_le_bytes());
        extra.extend_from_slice(&(values.len() as u16).to_le_bytes());
        extra.extend_from_slice(&values);
        extra
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<u64> {
        let zip64 = self.zip64_extra();
        let version = if zip64.is_empty() {
            VERSION_DEFAULT
        } else {
            VERSION_ZIP64
        };
        let clamp = |value: u64| value.min(ZIP64_MARKER_32 as u64) as u32;
        let extra_len = zip64.len() + self.extra.len();

        out.write_all(CDFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>((CREATOR_UNIX << 8) | version)?;
        out.write_u16::<LittleEndian>(version)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(clamp(self.compressed_size))?;
        out.write_u32::<LittleEndian>(clamp(self.uncompressed_size))?;
        out.write_u16::<LittleEndian>(field_len(self.file_name.len())?)?;
        out.write_u16::<LittleEndian>(field_len(extra_len)?)?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(UNIX_FILE_ATTRIBUTES)?;
        out.write_u32::<LittleEndian>(clamp(self.lfh_offset))?;
        out.write_all(&self.file_name)?;
        out.write_all(&zip64)?;
        out.write_all(&self.extra)?;

        Ok((CDFH_MIN_SIZE + self.file_name.len() + extra_len) as u64)
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Builds the record for a single-disk archive, using ZIP64 markers for
    /// any field that does not fit.
    pub fn new(entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        let entries = entries.min(ZIP64_MARKER_16 as u64) as u16;
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size: cd_size.min(ZIP64_MARKER_32 as u64) as u32,
            cd_offset: cd_offset.min(ZIP64_MARKER_32 as u64) as u32,
            comment_len: 0,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_MARKER_16
            || self.total_entries == ZIP64_MARKER_16
            || self.cd_size == ZIP64_MARKER_32
            || self.cd_offset == ZIP64_MARKER_32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.disk_with_eocd64)?;
        out.write_u64::<LittleEndian>(self.eocd64_offset)?;
        out.write_u32::<LittleEndian>(self.total_disks)
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn new(entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        Self {
            // Size of the remaining record, excluding signature and this field.
            eocd64_size: (Self::MIN_SIZE - 12) as u64,
            version_made_by: (CREATOR_UNIX << 8) | VERSION_ZIP64,
            version_needed: VERSION_ZIP64,
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u64::<LittleEndian>(self.eocd64_size)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u32::<LittleEndian>(self.disk_number)?;
        out.write_u32::<LittleEndian>(self.disk_with_cd)?;
        out.write_u64::<LittleEndian>(self.disk_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.cd_size)?;
        out.write_u64::<LittleEndian>(self.cd_offset)
    }
}

fn field_len(len: usize) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "header field longer than 65535 bytes")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn dos_time_packs_fields_at_two_second_resolution() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 17)
            .unwrap()
            .and_hms_opt(13, 45, 31)
            .unwrap();
        let dos = DosDateTime::from_datetime(&dt);

        assert_eq!(dos.date, ((2024 - 1980) << 9) | (3 << 5) | 17);
        assert_eq!(dos.time, (13 << 11) | (45 << 5) | (30 / 2));
    }

    #[test]
    fn years_before_1980_are_clamped() {
        let dt = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(DosDateTime::from_datetime(&dt).date >> 9, 0);
    }

    #[test]
    fn eocd_layout() {
        let eocd = EndOfCentralDirectory::new(3, 150, 1024);
        let mut buf = Vec::new();
        eocd.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);

        assert_eq!(&buf[0..4], EndOfCentralDirectory::SIGNATURE);
        assert_eq!(&buf[8..10], &3u16.to_le_bytes());
        assert_eq!(&buf[10..12], &3u16.to_le_bytes());
        assert_eq!(&buf[12..16], &150u32.to_le_bytes());
        assert_eq!(&buf[16..20], &1024u32.to_le_bytes());
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn oversized_eocd_fields_use_zip64_markers() {
        let eocd = EndOfCentralDirectory::new(70_000, 10, 5_000_000_000);
        assert_eq!(eocd.total_entries, ZIP64_MARKER_16);
        assert_eq!(eocd.cd_offset, ZIP64_MARKER_32);
        assert!(eocd.is_zip64());

        let mut buf = Vec::new();
        Zip64EOCD::new(70_000, 10, 5_000_000_000)
            .write_to(&mut buf)
            .unwrap();
        assert_eq!(buf.len(), Zip64EOCD::MIN_SIZE);
        assert_eq!(&buf[0..4], Zip64EOCD::SIGNATURE);
        assert_eq!(&buf[4..12], &44u64.to_le_bytes());
        assert_eq!(&buf[32..40], &70_000u64.to_le_bytes());
        assert_eq!(&buf[48..56], &5_000_000_000u64.to_le_bytes());
    }

    #[test]
    fn central_header_adds_zip64_extra_only_when_needed() {
        let mut header = CentralDirectoryHeader {
            flags: FLAG_DATA_DESCRIPTOR,
            compression_method: CompressionMethod::Deflate,
            modified: DosDateTime { time: 0, date: 0 },
            crc32: 0,
            compressed_size: 10,
            uncompressed_size: 20,
            lfh_offset: 0,
            file_name: b"a.txt".to_vec(),
            extra: Vec::new(),
        };
        let mut small = Vec::new();
        assert_eq!(header.write_to(&mut small).unwrap(), 51);
        assert_eq!(small.len(), 51);

        header.uncompressed_size = 5_000_000_000;
        let mut large = Vec::new();
        assert_eq!(header.write_to(&mut large).unwrap(), 51 + 12);
        assert_eq!(&large[24..28], &ZIP64_MARKER_32.to_le_bytes());
    }
}
