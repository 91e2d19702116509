#![allow(dead_code)]

use std::io::{Cursor, Write};

use binrw::BinWrite;
use bootjar_archive::types::{
    CentralDirectoryFileHeader, EndOfCentralDirectoryRecord, LocalFileHeader,
};
use crc::{Crc, CRC_32_ISO_HDLC};
use flate2::{write::DeflateEncoder, Compression};

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

struct Pending {
    name: Vec<u8>,
    data: Vec<u8>,
    method: u16,
    crc32: u32,
    uncompressed_size: u32,
    flags: u16,
    local_extra: Vec<u8>,
}

/// Writes small archives in memory
#[derive(Default)]
pub struct ArchiveBuilder {
    prefix: Vec<u8>,
    comment: Vec<u8>,
    entries: Vec<Pending>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        ArchiveBuilder::default()
    }

    /// Bytes written in front of the archive, the recorded offsets do not account for them
    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.prefix = prefix.to_vec();
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data.to_vec(), 0, data)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        self.entry(name, encoder.finish().unwrap(), 8, data)
    }

    pub fn directory(self, name: &str) -> Self {
        assert!(name.ends_with('/'));
        self.stored(name, b"")
    }

    /// An entry with any method id, stored as given
    pub fn raw(self, name: &str, data: &[u8], method: u16) -> Self {
        self.entry(name, data.to_vec(), method, data)
    }

    /// Set the general purpose flags of the last entry
    pub fn flags(mut self, flags: u16) -> Self {
        self.entries.last_mut().unwrap().flags = flags;
        self
    }

    /// Give the last entry a local extra field that the central directory does not have
    pub fn local_extra(mut self, extra: &[u8]) -> Self {
        self.entries.last_mut().unwrap().local_extra = extra.to_vec();
        self
    }

    /// Replace the recorded CRC-32 of the last entry
    pub fn crc32(mut self, crc32: u32) -> Self {
        self.entries.last_mut().unwrap().crc32 = crc32;
        self
    }

    fn entry(mut self, name: &str, stored: Vec<u8>, method: u16, original: &[u8]) -> Self {
        self.entries.push(Pending {
            name: name.as_bytes().to_vec(),
            data: stored,
            method,
            crc32: CRC32.checksum(original),
            uncompressed_size: original.len() as u32,
            flags: 0,
            local_extra: Vec::new(),
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        let mut headers = Vec::new();

        for entry in &self.entries {
            let offset = out.position() as u32;
            LocalFileHeader {
                version_needed: 20,
                flags: entry.flags,
                compression: entry.method,
                crc32: entry.crc32,
                compressed_size: entry.data.len() as u32,
                uncompressed_size: entry.uncompressed_size,
                name_length: entry.name.len() as u16,
                extra_length: entry.local_extra.len() as u16,
                ..Default::default()
            }
            .write(&mut out)
            .unwrap();
            out.write_all(&entry.name).unwrap();
            out.write_all(&entry.local_extra).unwrap();
            out.write_all(&entry.data).unwrap();

            headers.push(CentralDirectoryFileHeader {
                version_made_by: 20,
                version_needed: 20,
                flags: entry.flags,
                compression: entry.method,
                crc32: entry.crc32,
                compressed_size: entry.data.len() as u32,
                uncompressed_size: entry.uncompressed_size,
                name_length: entry.name.len() as u16,
                local_header_offset: offset,
                name: entry.name.clone(),
                ..Default::default()
            });
        }

        let central_directory_offset = out.position() as u32;
        for header in &headers {
            header.write(&mut out).unwrap();
        }
        let central_directory_size = out.position() as u32 - central_directory_offset;

        EndOfCentralDirectoryRecord {
            disk_entries: headers.len() as u16,
            total_entries: headers.len() as u16,
            central_directory_size,
            central_directory_offset,
            comment_length: self.comment.len() as u16,
            ..Default::default()
        }
        .write(&mut out)
        .unwrap();
        out.write_all(&self.comment).unwrap();

        let mut bytes = self.prefix;
        bytes.extend(out.into_inner());
        bytes
    }
}

/// Path of a file under `resources/`
pub fn resource(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("resources")
        .join(name)
}
