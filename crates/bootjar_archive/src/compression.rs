//! Entry decompression handling.

use std::io::{self, Read, Take};

use crc::{Crc, Digest, CRC_32_ISO_HDLC};
use flate2::read::DeflateDecoder;
use tracing::{instrument, trace};

use crate::region::RegionStream;

pub(crate) static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Identifies how an entry's data is stored inside the archive
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    Stored,

    /// Raw deflate stream
    Deflated,

    /// Any other method, which this library can list but not read
    Unsupported(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => CompressionMethod::Unsupported(other),
        }
    }
}

impl From<CompressionMethod> for u16 {
    fn from(value: CompressionMethod) -> Self {
        match value {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Unsupported(other) => other,
        }
    }
}

enum Decoder {
    Stored(Take<RegionStream>),
    Deflated(Take<Box<DeflateDecoder<RegionStream>>>),
}

impl Read for Decoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Stored(r) => r.read(buf),
            Decoder::Deflated(r) => r.read(buf),
        }
    }
}

/// A forward-only reader over the uncompressed content of one entry
///
/// Created with [`crate::JarArchive::open_stream`]. Stored entries are read directly from the
/// archive bytes; deflated entries are inflated on the fly and never yield more than the
/// entry's declared uncompressed size.
pub struct EntryStream {
    decoder: Decoder,
    size: u64,
    remaining: u64,
    checksum: Option<(Digest<'static, u32>, u32)>,
}

impl EntryStream {
    #[instrument(skip(data))]
    pub(crate) fn new(
        data: RegionStream,
        compression: CompressionMethod,
        uncompressed_size: u64,
        expected_crc: Option<u32>,
    ) -> Self {
        let decoder = match compression {
            CompressionMethod::Deflated => {
                Decoder::Deflated(Box::new(DeflateDecoder::new(data)).take(uncompressed_size))
            }
            _ => Decoder::Stored(data.take(uncompressed_size)),
        };
        EntryStream {
            decoder,
            size: uncompressed_size,
            remaining: uncompressed_size,
            checksum: expected_crc.map(|crc| (CRC32.digest(), crc)),
        }
    }

    /// Declared uncompressed size of the entry
    pub fn size(&self) -> u64 {
        self.size
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.remaining != 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry ended {} bytes early", self.remaining),
            ));
        }
        if let Some((digest, expected)) = self.checksum.take() {
            let actual = digest.finalize();
            trace!(actual, expected, "verified entry checksum");
            if actual != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("crc mismatch: expected {expected:#010x}, found {actual:#010x}"),
                ));
            }
        }
        Ok(())
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.decoder.read(buf)?;
        if n == 0 {
            self.finish()?;
            return Ok(0);
        }
        self.remaining = self.remaining.saturating_sub(n as u64);
        if let Some((digest, _)) = self.checksum.as_mut() {
            digest.update(&buf[..n]);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};
    use std::sync::Arc;

    use flate2::{write::DeflateEncoder, Compression};
    use pretty_assertions::assert_eq;

    use crate::compression::{CompressionMethod, EntryStream, CRC32};
    use crate::error::Result;
    use crate::region::{RandomAccessRegion, ResourceAccess};

    fn stream(bytes: Vec<u8>) -> crate::region::RegionStream {
        RandomAccessRegion::new(Arc::new(bytes)).open_stream(ResourceAccess::Once, 16)
    }

    #[test]
    fn method_from_u16() {
        assert_eq!(CompressionMethod::from(0), CompressionMethod::Stored);
        assert_eq!(CompressionMethod::from(8), CompressionMethod::Deflated);
        assert_eq!(
            CompressionMethod::from(12),
            CompressionMethod::Unsupported(12)
        );
        assert_eq!(u16::from(CompressionMethod::Unsupported(12)), 12);
    }

    #[test]
    fn read_stored() -> Result<()> {
        let mut entry = EntryStream::new(
            stream(b"hello".to_vec()),
            CompressionMethod::Stored,
            5,
            None,
        );

        let mut out = Vec::new();
        entry.read_to_end(&mut out)?;
        assert_eq!(out, b"hello");

        Ok(())
    }

    #[test]
    fn read_deflated_stops_at_declared_size() -> Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Hello World")?;
        let compressed = encoder.finish()?;

        let mut entry = EntryStream::new(
            stream(compressed),
            CompressionMethod::Deflated,
            11,
            Some(CRC32.checksum(b"Hello World")),
        );

        let mut out = String::new();
        entry.read_to_string(&mut out)?;
        assert_eq!(out, "Hello World");

        Ok(())
    }

    #[test]
    fn checksum_mismatch_is_invalid_data() {
        let mut entry = EntryStream::new(
            stream(b"hello".to_vec()),
            CompressionMethod::Stored,
            5,
            Some(0xDEAD_BEEF),
        );

        let err = entry.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_data_is_unexpected_eof() {
        let mut entry = EntryStream::new(
            stream(b"hel".to_vec()),
            CompressionMethod::Stored,
            5,
            None,
        );

        let err = entry.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
