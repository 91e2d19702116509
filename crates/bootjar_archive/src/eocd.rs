//! Locating the end of central directory record.
//!
//! The record is 22 bytes plus a comment of up to 65535 bytes, so it is found by reading a
//! window from the end of the data and trying every candidate record size until the
//! signature matches and the declared comment length accounts for exactly the bytes that
//! remain. The window starts small and grows when it is exhausted.

use std::io::Cursor;

use binrw::BinRead;
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};
use crate::region::RandomAccessRegion;
use crate::types::{EndOfCentralDirectoryRecord, ZIP64_LOCATOR_SIGNATURE, ZIP64_LOCATOR_SIZE};

/// Largest comment the record can declare
pub const MAXIMUM_COMMENT_LENGTH: u64 = u16::MAX as u64;

/// Largest possible size of the record including its comment
pub const MAXIMUM_SIZE: u64 = EndOfCentralDirectoryRecord::SIZE + MAXIMUM_COMMENT_LENGTH;

/// Default size of the first window read from the end of the data
pub const DEFAULT_READ_BLOCK_SIZE: usize = 256;

/// A located and validated end of central directory record
#[derive(Debug, Clone)]
pub struct CentralDirectoryEnd {
    record: EndOfCentralDirectoryRecord,
    comment: Vec<u8>,
    /// size of the record including its comment
    size: u64,
    /// size of the data the record was located in
    data_size: u64,
}

impl CentralDirectoryEnd {
    /// Find the record at the end of `data`, reading `block_size` bytes at a time.
    #[instrument(skip(data), fields(size = data.size()), err)]
    pub fn locate(data: &RandomAccessRegion, block_size: usize) -> Result<CentralDirectoryEnd> {
        let block_size = block_size.max(EndOfCentralDirectoryRecord::SIZE as usize) as u64;
        let minimum = EndOfCentralDirectoryRecord::SIZE;

        if data.size() < minimum {
            return Err(Error::MalformedArchive(format!(
                "{} bytes is too small to hold an end of central directory record",
                data.size()
            )));
        }

        let mut block = read_tail(data, block_size)?;
        let mut size = minimum;
        loop {
            if size > block.len() as u64 {
                if size > MAXIMUM_SIZE || size > data.size() {
                    return Err(Error::MalformedArchive(format!(
                        "unable to find end of central directory record after reading {} bytes",
                        block.len()
                    )));
                }
                block = read_tail(data, (size + block_size).min(MAXIMUM_SIZE))?;
                trace!(window = block.len(), "grew end record search window");
            }

            let offset = block.len() - size as usize;
            if is_valid(&block, offset, size) {
                let record = EndOfCentralDirectoryRecord::read(&mut Cursor::new(&block[offset..]))?;
                let comment_start = offset + minimum as usize;
                let end = CentralDirectoryEnd {
                    record,
                    comment: block[comment_start..].to_vec(),
                    size,
                    data_size: data.size(),
                };
                end.check_zip64(data)?;
                debug!(
                    entries = record.total_entries,
                    central_directory_size = record.central_directory_size,
                    central_directory_offset = record.central_directory_offset,
                    start_of_archive = ?end.start_of_archive().ok(),
                    "located end of central directory"
                );
                return Ok(end);
            }
            size += 1;
        }
    }

    fn check_zip64(&self, data: &RandomAccessRegion) -> Result<()> {
        let record = &self.record;
        if record.central_directory_size == u32::MAX || record.central_directory_offset == u32::MAX
        {
            return Err(Error::UnsupportedArchive(
                "central directory location needs the zip64 extension".into(),
            ));
        }
        // 0xFFFF entries is a legal count on its own, only a locator makes it a sentinel
        if record.has_zip64_sentinel() && self.position() >= ZIP64_LOCATOR_SIZE {
            let mut signature = [0u8; 4];
            data.read_exact_at(self.position() - ZIP64_LOCATOR_SIZE, &mut signature)?;
            if LittleEndian::read_u32(&signature) == ZIP64_LOCATOR_SIGNATURE {
                return Err(Error::UnsupportedArchive(
                    "found a zip64 end of central directory locator".into(),
                ));
            }
        }
        Ok(())
    }

    /// The raw record
    pub fn record(&self) -> &EndOfCentralDirectoryRecord {
        &self.record
    }

    /// Number of entries declared by the record
    pub fn number_of_records(&self) -> u16 {
        self.record.total_entries
    }

    /// Size of the record including its comment
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The archive comment
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Position of the record within the data it was located in
    pub fn position(&self) -> u64 {
        self.data_size - self.size
    }

    /// Position of the central directory within the data the record was located in
    pub fn central_directory_position(&self) -> Result<u64> {
        self.position()
            .checked_sub(self.record.central_directory_size as u64)
            .ok_or_else(|| {
                Error::MalformedArchive(format!(
                    "central directory of {} bytes does not fit before its end record",
                    self.record.central_directory_size
                ))
            })
    }

    /// Number of bytes in front of the archive proper: the actual position of the central
    /// directory minus the position the writer recorded for it.
    ///
    /// Non-zero when the archive has been appended to other data such as a launch script.
    pub fn start_of_archive(&self) -> Result<u64> {
        let recorded = self.record.central_directory_offset as u64;
        self.central_directory_position()?
            .checked_sub(recorded)
            .ok_or_else(|| {
                Error::MalformedArchive(format!(
                    "central directory recorded at {recorded} lies beyond its actual position"
                ))
            })
    }

    /// The central directory, sliced from `archive` which must start at
    /// [`CentralDirectoryEnd::start_of_archive`].
    pub fn central_directory(&self, archive: &RandomAccessRegion) -> Result<RandomAccessRegion> {
        archive.subsection(
            self.record.central_directory_offset as u64,
            self.record.central_directory_size as u64,
        )
    }
}

fn read_tail(data: &RandomAccessRegion, length: u64) -> Result<Vec<u8>> {
    let length = data.size().min(length);
    data.subsection(data.size() - length, length)?.read_all()
}

fn is_valid(block: &[u8], offset: usize, size: u64) -> bool {
    if LittleEndian::read_u32(&block[offset..offset + 4]) != EndOfCentralDirectoryRecord::SIGNATURE
    {
        return false;
    }
    let comment_offset = offset + EndOfCentralDirectoryRecord::COMMENT_LENGTH_OFFSET;
    let comment_length = LittleEndian::read_u16(&block[comment_offset..comment_offset + 2]);
    size == EndOfCentralDirectoryRecord::SIZE + comment_length as u64
}
