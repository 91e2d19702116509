//! Base types for the on-disk structure of a ZIP file.
//!
//! All multi-byte integers are little endian.

use binrw::{BinRead, BinWrite};

/// End of central directory record, found at the very end of the archive.
///
/// The fixed part is 22 bytes long (including the signature `PK\x05\x06`) and is followed by
/// a comment of `comment_length` bytes, which is why the record cannot be found at a fixed
/// offset from the end of the file.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(magic = b"PK\x05\x06", little)]
pub struct EndOfCentralDirectoryRecord {
    /// Number of this disk
    pub disk_number: u16,

    /// Disk where the central directory starts
    pub central_directory_disk: u16,

    /// Number of central directory records on this disk
    pub disk_entries: u16,

    /// Total number of central directory records
    pub total_entries: u16,

    /// Size of the central directory in bytes
    pub central_directory_size: u32,

    /// Offset of the central directory, as recorded by the writer
    pub central_directory_offset: u32,

    /// Length of the comment that follows this record
    pub comment_length: u16,
}

impl EndOfCentralDirectoryRecord {
    /// Signature as a little endian integer
    pub const SIGNATURE: u32 = 0x06054b50;

    /// Size of the fixed part of the record
    pub const SIZE: u64 = 22;

    /// Offset of the comment length field within the record
    pub const COMMENT_LENGTH_OFFSET: usize = 20;

    /// Whether any field carries a ZIP64 sentinel value
    pub fn has_zip64_sentinel(&self) -> bool {
        self.disk_entries == u16::MAX
            || self.total_entries == u16::MAX
            || self.central_directory_size == u32::MAX
            || self.central_directory_offset == u32::MAX
    }
}

/// Signature of the ZIP64 end of central directory locator, which sits right before a
/// ZIP64 archive's end record.
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Size of the ZIP64 end of central directory locator
pub const ZIP64_LOCATOR_SIZE: u64 = 20;

/// Central directory file header
///
/// Describes one entry of the archive. The fixed part is 46 bytes long (including the
/// signature `PK\x01\x02`), followed by the name, extra field and comment.
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq, Eq)]
#[brw(magic = b"PK\x01\x02", little)]
pub struct CentralDirectoryFileHeader {
    /// Version of the tool that wrote the entry
    pub version_made_by: u16,

    /// Minimum version needed to extract
    pub version_needed: u16,

    /// General purpose bit flags
    pub flags: u16,

    /// Compression method, see [`crate::CompressionMethod`]
    pub compression: u16,

    /// DOS last modification time
    pub last_modified_time: u16,

    /// DOS last modification date
    pub last_modified_date: u16,

    /// CRC-32 of the uncompressed data
    pub crc32: u32,

    /// Size of the data as stored
    pub compressed_size: u32,

    /// Size of the data once uncompressed
    pub uncompressed_size: u32,

    /// Length of the name
    pub name_length: u16,

    /// Length of the extra field
    pub extra_length: u16,

    /// Length of the comment
    pub comment_length: u16,

    /// Disk on which the entry starts
    pub disk_number_start: u16,

    /// Internal file attributes
    pub internal_attributes: u16,

    /// External file attributes
    pub external_attributes: u32,

    /// Offset of the local file header, relative to the start of the archive
    pub local_header_offset: u32,

    /// Raw name of the entry
    #[br(count = name_length)]
    pub name: Vec<u8>,

    /// Raw extra field
    #[br(count = extra_length)]
    pub extra: Vec<u8>,

    /// Raw comment
    #[br(count = comment_length)]
    pub comment: Vec<u8>,
}

impl CentralDirectoryFileHeader {
    /// Signature as a little endian integer
    pub const SIGNATURE: u32 = 0x02014b50;

    /// Size of the fixed part of the header
    pub const BASE_SIZE: u64 = 46;

    /// Size of the whole header including the variable length fields
    pub fn total_size(&self) -> u64 {
        Self::BASE_SIZE
            + self.name_length as u64
            + self.extra_length as u64
            + self.comment_length as u64
    }
}

/// Local file header, immediately followed by the entry's data.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"PK\x03\x04", little)]
pub struct LocalFileHeader {
    /// Minimum version needed to extract
    pub version_needed: u16,

    /// General purpose bit flags
    pub flags: u16,

    /// Compression method
    pub compression: u16,

    /// DOS last modification time
    pub last_modified_time: u16,

    /// DOS last modification date
    pub last_modified_date: u16,

    /// CRC-32 of the uncompressed data, zero when a data descriptor follows the data
    pub crc32: u32,

    /// Size of the data as stored, zero when a data descriptor follows the data
    pub compressed_size: u32,

    /// Size of the data once uncompressed
    pub uncompressed_size: u32,

    /// Length of the name that follows
    pub name_length: u16,

    /// Length of the extra field that follows the name
    pub extra_length: u16,
}

impl LocalFileHeader {
    /// Size of the fixed part of the header
    pub const SIZE: u64 = 30;

    /// Offset of the entry data relative to the start of this header
    pub fn data_offset(&self) -> u64 {
        Self::SIZE + self.name_length as u64 + self.extra_length as u64
    }
}
