//! Single pass parsing of the central directory.
//!
//! The parser reads exactly as many headers as the end record declares and hands each one to
//! every registered [`CentralDirectoryVisitor`], so several indexes can be built from one
//! pass over the bytes.

use binrw::BinRead;
use tracing::{debug, instrument, trace};

use crate::eocd::CentralDirectoryEnd;
use crate::error::{Error, Result};
use crate::options::ArchiveOptions;
use crate::region::{RandomAccessRegion, ResourceAccess};
use crate::types::CentralDirectoryFileHeader;

/// Receives the content of a central directory while it is parsed
pub trait CentralDirectoryVisitor {
    /// Called once before the first header
    fn visit_start(&mut self, _end: &CentralDirectoryEnd, _directory: &RandomAccessRegion) {}

    /// Called for every header, with the offset of the header from the start of the central
    /// directory
    fn visit_file_header(&mut self, header: &CentralDirectoryFileHeader, header_offset: u64);

    /// Called once after the last header
    fn visit_end(&mut self) {}
}

/// The archive bytes found by a parse
#[derive(Debug, Clone)]
pub struct ParsedArchive {
    /// The archive proper, starting at its first local header
    pub data: RandomAccessRegion,
    /// The end record the archive was located from
    pub end: CentralDirectoryEnd,
    /// Number of bytes in front of the archive within the parsed data
    pub start_of_archive: u64,
}

/// Parses a central directory, forwarding everything to its visitors
#[derive(Default)]
pub struct CentralDirectoryParser<'v> {
    visitors: Vec<&'v mut dyn CentralDirectoryVisitor>,
}

impl<'v> CentralDirectoryParser<'v> {
    /// A parser without visitors
    pub fn new() -> Self {
        CentralDirectoryParser::default()
    }

    /// Register a visitor. Visitors are called in the order they were added.
    pub fn add_visitor(&mut self, visitor: &'v mut dyn CentralDirectoryVisitor) -> &mut Self {
        self.visitors.push(visitor);
        self
    }

    /// Parse the archive held at the end of `data`.
    ///
    /// Leading bytes that are not part of the archive (such as a launch script) are skipped;
    /// the returned region starts where the archive starts.
    #[instrument(skip_all, fields(size = data.size()), err)]
    pub fn parse(
        &mut self,
        data: &RandomAccessRegion,
        options: &ArchiveOptions,
    ) -> Result<ParsedArchive> {
        let end = CentralDirectoryEnd::locate(data, options.eocd_block_size)?;
        let start = end.start_of_archive()?;
        let archive = data.subsection(start, data.size() - start)?;
        let central_directory = end.central_directory(&archive)?;

        for visitor in self.visitors.iter_mut() {
            visitor.visit_start(&end, &central_directory);
        }

        let mut stream =
            central_directory.open_stream(ResourceAccess::Once, options.buffer_capacity);
        let expected = end.number_of_records();
        let mut header_offset = 0u64;
        for index in 0..expected {
            let header = match CentralDirectoryFileHeader::read(&mut stream) {
                Ok(header) => header,
                Err(err) if err.is_eof() => {
                    return Err(Error::MalformedArchive(format!(
                        "central directory ends after {index} of {expected} records"
                    )));
                }
                Err(err) => return Err(err.into()),
            };
            check_zip64(&header)?;
            trace!(
                name = %String::from_utf8_lossy(&header.name),
                header_offset,
                "read central directory header"
            );
            for visitor in self.visitors.iter_mut() {
                visitor.visit_file_header(&header, header_offset);
            }
            header_offset += header.total_size();
        }

        for visitor in self.visitors.iter_mut() {
            visitor.visit_end();
        }

        debug!(
            records = expected,
            start_of_archive = start,
            "parsed central directory"
        );

        Ok(ParsedArchive {
            data: archive,
            end,
            start_of_archive: start,
        })
    }
}

fn check_zip64(header: &CentralDirectoryFileHeader) -> Result<()> {
    if header.compressed_size == u32::MAX
        || header.uncompressed_size == u32::MAX
        || header.local_header_offset == u32::MAX
    {
        return Err(Error::UnsupportedArchive(format!(
            "entry '{}' needs the zip64 extension",
            String::from_utf8_lossy(&header.name)
        )));
    }
    Ok(())
}
