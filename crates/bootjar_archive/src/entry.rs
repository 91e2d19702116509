//! Entries of an archive as described by its central directory.

use std::borrow::Cow;
use std::fmt::{self, Debug};

use crate::compression::CompressionMethod;
use crate::types::CentralDirectoryFileHeader;

/// Separator between the components of an entry name
pub const SEPARATOR: u8 = b'/';

/// Bit 0 of the general purpose flags
const FLAG_ENCRYPTED: u16 = 0x0001;

/// Metadata of one entry, as read from its central directory header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRecord {
    /// Raw name, not decoded
    pub name: Box<[u8]>,
    /// How the data is stored
    pub compression_method: CompressionMethod,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Size of the data as stored in the archive
    pub compressed_size: u64,
    /// Size of the data once uncompressed
    pub uncompressed_size: u64,
    /// Offset of the local file header from the start of the archive
    pub local_header_offset: u64,
    /// Offset of this record's header within the central directory
    pub header_offset: u64,
    /// Length of the extra field of the central directory header
    pub extra_length: u16,
    /// Raw entry comment
    pub comment: Box<[u8]>,
    /// General purpose bit flags
    pub flags: u16,
    /// DOS last modification time
    pub last_modified_time: u16,
    /// DOS last modification date
    pub last_modified_date: u16,
}

impl EntryRecord {
    /// Build a record from a parsed header found at `header_offset` in the central directory
    pub fn from_header(header: &CentralDirectoryFileHeader, header_offset: u64) -> EntryRecord {
        EntryRecord {
            name: header.name.as_slice().into(),
            compression_method: header.compression.into(),
            crc32: header.crc32,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            local_header_offset: header.local_header_offset as u64,
            header_offset,
            extra_length: header.extra_length,
            comment: header.comment.as_slice().into(),
            flags: header.flags,
            last_modified_time: header.last_modified_time,
            last_modified_date: header.last_modified_date,
        }
    }

    /// Whether the entry is a directory, i.e. its name ends with `/`
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&SEPARATOR)
    }

    /// Whether the entry data is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Modification date as (year, month, day)
    pub fn modified_date(&self) -> (u16, u8, u8) {
        let day = (self.last_modified_date & 0x1F) as u8;
        let month = ((self.last_modified_date >> 5) & 0x0F) as u8;
        let year = ((self.last_modified_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Modification time as (hour, minute, second)
    pub fn modified_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_modified_time & 0x1F) * 2) as u8;
        let minute = ((self.last_modified_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_modified_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// An entry as seen through one archive view.
///
/// The name is the one visible in the view, which differs from [`EntryRecord::name`] for
/// entries of a directory view.
#[derive(Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    name: Cow<'a, [u8]>,
    record: &'a EntryRecord,
}

impl Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Entry({:?}, {:#?})", self.name_lossy(), self.record)
    }
}

impl<'a> Entry<'a> {
    pub(crate) fn new(name: Cow<'a, [u8]>, record: &'a EntryRecord) -> Self {
        Entry { name, record }
    }

    /// Get the name of the entry, in the raw (internal) byte representation.
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Get the name of the entry decoded as UTF-8, replacing invalid sequences
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The underlying central directory record
    pub fn record(&self) -> &'a EntryRecord {
        self.record
    }

    /// Whether the entry is a directory
    pub fn is_directory(&self) -> bool {
        self.record.is_directory()
    }

    /// Get the size of the entry, in bytes, when uncompressed
    pub fn size(&self) -> u64 {
        self.record.uncompressed_size
    }

    /// Get the size of the entry, in bytes, in the archive
    pub fn compressed_size(&self) -> u64 {
        self.record.compressed_size
    }

    /// Get the compression method used for this entry
    pub fn compression_method(&self) -> CompressionMethod {
        self.record.compression_method
    }

    /// Get the CRC32 hash of the original data
    pub fn crc32(&self) -> u32 {
        self.record.crc32
    }

    /// Take the visible name
    pub fn into_name(self) -> Cow<'a, [u8]> {
        self.name
    }
}
