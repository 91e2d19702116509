//! Random access to a byte range of a shared source.
//!
//! A [`RandomAccessRegion`] never copies. It is a window of `(offset, length)` over a
//! [`ReadAt`] source, and [`RandomAccessRegion::subsection`] yields another window over the
//! same source. Every read is positioned, so any number of readers (and threads) may work on
//! overlapping regions at once without sharing a seek pointer.

use std::{
    fmt::{self, Debug},
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// A source of bytes that can be read at arbitrary positions through a shared reference.
pub trait ReadAt: Send + Sync {
    /// Read into `buf` starting at `offset`, returning how many bytes were read.
    ///
    /// Returns `Ok(0)` at or beyond the end of the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total size of the source in bytes
    fn size(&self) -> u64;

    /// Release the resources behind the source. Later reads fail.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        <[u8] as ReadAt>::read_at(self.as_slice(), offset, buf)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.len() {
            return Ok(0);
        }
        let count = buf.len().min(self.len() - start);
        buf[..count].copy_from_slice(&self[start..start + count]);
        Ok(count)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// The file at the root of an archive hierarchy.
///
/// The file descriptor is owned here and released by [`ReadAt::close`]; every region derived
/// from the file refers to this value, and reads after the close fail with
/// [`io::ErrorKind::NotConnected`].
pub struct RootFile {
    path: PathBuf,
    size: u64,
    file: RwLock<Option<File>>,
}

impl RootFile {
    /// Open the file at `path` for reading
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        debug!(size, "opened root file");
        Ok(RootFile {
            path: path.to_path_buf(),
            size,
            file: RwLock::new(Some(file)),
        })
    }

    /// The path the file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`ReadAt::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.file.read().map(|f| f.is_none()).unwrap_or(true)
    }
}

impl Debug for RootFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RootFile({})", self.path.display())
    }
}

impl ReadAt for RootFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let guard = self
            .file
            .read()
            .map_err(|_| io::Error::other("root file lock poisoned"))?;
        let Some(file) = guard.as_ref() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} has been closed", self.path.display()),
            ));
        };
        positioned_read(file, offset, buf)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn close(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .write()
            .map_err(|_| io::Error::other("root file lock poisoned"))?;
        if guard.take().is_some() {
            debug!(path = %self.path.display(), "closed root file");
        }
        Ok(())
    }
}

#[cfg(unix)]
fn positioned_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn positioned_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(not(any(unix, windows)))]
fn positioned_read(_file: &File, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "positioned reads are not available on this platform",
    ))
}

/// How a stream over a region is going to be consumed
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ResourceAccess {
    /// A single sequential pass; reads go through a buffer.
    #[default]
    Once,

    /// The region is opened many times (e.g. a manifest); every read goes straight to the
    /// source at its position.
    Repeatable,
}

/// A bounded, zero-copy window over a [`ReadAt`] source
#[derive(Clone)]
pub struct RandomAccessRegion {
    source: Arc<dyn ReadAt>,
    offset: u64,
    length: u64,
}

impl Debug for RandomAccessRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RandomAccessRegion")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

impl RandomAccessRegion {
    /// A region covering the whole of `source`
    pub fn new(source: Arc<dyn ReadAt>) -> Self {
        let length = source.size();
        RandomAccessRegion {
            source,
            offset: 0,
            length,
        }
    }

    /// Size of the region in bytes
    pub fn size(&self) -> u64 {
        self.length
    }

    /// Whether the region holds no bytes
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Position of the region's first byte within the root source
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The source shared by this region and all of its subsections
    pub fn source(&self) -> &Arc<dyn ReadAt> {
        &self.source
    }

    /// A view of `length` bytes starting at `offset` within this region
    pub fn subsection(&self, offset: u64, length: u64) -> Result<RandomAccessRegion> {
        match offset.checked_add(length) {
            Some(end) if end <= self.length => Ok(RandomAccessRegion {
                source: self.source.clone(),
                offset: self.offset + offset,
                length,
            }),
            _ => Err(Error::Range {
                offset,
                length,
                size: self.length,
            }),
        }
    }

    /// Positioned read relative to the region start, never past the region end
    pub fn read_at(&self, position: u64, buf: &mut [u8]) -> io::Result<usize> {
        if position >= self.length {
            return Ok(0);
        }
        let available = self.length - position;
        let count = usize::try_from(available).map_or(buf.len(), |a| a.min(buf.len()));
        self.source
            .read_at(self.offset + position, &mut buf[..count])
    }

    /// Fill `buf` completely from `position`, failing with
    /// [`io::ErrorKind::UnexpectedEof`] on a short region.
    pub fn read_exact_at(&self, mut position: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(position, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "unable to read bytes",
                    ))
                }
                Ok(n) => {
                    position += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Copy the whole region into memory
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let length = usize::try_from(self.length).map_err(|_| Error::Range {
            offset: 0,
            length: self.length,
            size: self.length,
        })?;
        let mut bytes = vec![0u8; length];
        self.read_exact_at(0, &mut bytes)?;
        Ok(bytes)
    }

    /// A reader with its own position, starting at the region's first byte
    pub fn reader(&self) -> RegionReader {
        RegionReader {
            region: self.clone(),
            position: 0,
        }
    }

    /// Open a stream over the region for the given access pattern.
    ///
    /// `capacity` is the buffer size used for [`ResourceAccess::Once`].
    pub fn open_stream(&self, access: ResourceAccess, capacity: usize) -> RegionStream {
        match access {
            ResourceAccess::Once => {
                RegionStream::Once(BufReader::with_capacity(capacity, self.reader()))
            }
            ResourceAccess::Repeatable => RegionStream::Repeatable(self.reader()),
        }
    }
}

/// An independent cursor over a [`RandomAccessRegion`]
#[derive(Debug, Clone)]
pub struct RegionReader {
    region: RandomAccessRegion,
    position: u64,
}

impl RegionReader {
    /// The region being read
    pub fn region(&self) -> &RandomAccessRegion {
        &self.region
    }
}

impl Read for RegionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.region.read_at(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for RegionReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.region.length.checked_add_signed(d),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ));
        };
        self.position = target;
        Ok(target)
    }
}

/// A stream opened with [`RandomAccessRegion::open_stream`]
#[derive(Debug)]
pub enum RegionStream {
    /// Buffered, for a single sequential pass
    Once(BufReader<RegionReader>),
    /// Unbuffered positioned reads
    Repeatable(RegionReader),
}

impl Read for RegionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RegionStream::Once(r) => r.read(buf),
            RegionStream::Repeatable(r) => r.read(buf),
        }
    }
}

impl Seek for RegionStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            RegionStream::Once(r) => r.seek(pos),
            RegionStream::Repeatable(r) => r.seek(pos),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        match self {
            RegionStream::Once(r) => r.stream_position(),
            RegionStream::Repeatable(r) => r.stream_position(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::region::{RandomAccessRegion, ReadAt, ResourceAccess, RootFile};

    fn region(bytes: &[u8]) -> RandomAccessRegion {
        RandomAccessRegion::new(Arc::new(bytes.to_vec()))
    }

    #[test]
    fn subsection_is_relative_to_parent() -> Result<()> {
        let data = region(b"0123456789");
        let sub = data.subsection(2, 6)?;
        let inner = sub.subsection(1, 3)?;

        assert_eq!(sub.offset(), 2);
        assert_eq!(inner.offset(), 3);
        assert_eq!(inner.read_all()?, b"345");

        Ok(())
    }

    #[test]
    fn subsection_out_of_bounds_is_a_range_error() {
        let data = region(b"0123456789");

        assert!(matches!(
            data.subsection(8, 3),
            Err(Error::Range {
                offset: 8,
                length: 3,
                size: 10
            })
        ));
        assert!(matches!(
            data.subsection(u64::MAX, 2),
            Err(Error::Range { .. })
        ));
        assert!(data.subsection(10, 0).is_ok());
    }

    #[test]
    fn reads_stop_at_region_end() -> Result<()> {
        let data = region(b"0123456789").subsection(0, 4)?;
        let mut buf = [0u8; 8];

        assert_eq!(data.read_at(2, &mut buf)?, 2);
        assert_eq!(&buf[..2], b"23");
        assert_eq!(data.read_at(4, &mut buf)?, 0);
        assert!(data.read_exact_at(3, &mut buf[..2]).is_err());

        Ok(())
    }

    #[test]
    fn streams_do_not_share_position() -> Result<()> {
        let data = region(b"abcdef");
        let mut once = data.open_stream(ResourceAccess::Once, 2);
        let mut repeat = data.open_stream(ResourceAccess::Repeatable, 2);

        let mut a = [0u8; 3];
        once.read_exact(&mut a)?;
        let mut b = Vec::new();
        repeat.read_to_end(&mut b)?;

        assert_eq!(&a, b"abc");
        assert_eq!(b, b"abcdef");

        let mut rest = Vec::new();
        once.read_to_end(&mut rest)?;
        assert_eq!(rest, b"def");

        Ok(())
    }

    #[test]
    fn reader_seeks_within_region() -> Result<()> {
        let mut reader = region(b"0123456789").subsection(5, 5)?.reader();

        reader.seek(SeekFrom::End(-2))?;
        let mut out = String::new();
        reader.read_to_string(&mut out)?;
        assert_eq!(out, "89");

        assert!(reader.seek(SeekFrom::Current(-10)).is_err());

        Ok(())
    }

    #[test]
    fn concurrent_subsections_read_independently() -> Result<()> {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let data = RandomAccessRegion::new(Arc::new(bytes.clone()));

        let handles = (0..8u64)
            .map(|i| {
                let sub = data.subsection(i * 8192, 8192).unwrap();
                thread::spawn(move || sub.read_all().unwrap())
            })
            .collect::<Vec<_>>();

        for (i, handle) in handles.into_iter().enumerate() {
            let chunk = handle.join().unwrap();
            assert_eq!(chunk, bytes[i * 8192..(i + 1) * 8192]);
        }

        Ok(())
    }

    #[test]
    fn closed_root_file_fails_reads() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"some bytes")?;
        file.flush()?;

        let root = Arc::new(RootFile::open(file.path())?);
        let data = RandomAccessRegion::new(root.clone());
        let sub = data.subsection(5, 5)?;
        assert_eq!(sub.read_all()?, b"bytes");

        root.close()?;
        assert!(root.is_closed());
        let err = sub.read_all().unwrap_err();
        assert!(
            matches!(err, Error::IOError(ref e) if e.kind() == std::io::ErrorKind::NotConnected)
        );

        Ok(())
    }
}
