//! Types for reading JAR archives
//!

use std::{
    fmt::{self, Debug},
    path::Path,
    sync::{Arc, OnceLock},
};

use binrw::BinRead;
use tracing::{debug, instrument};

use crate::{
    compression::{CompressionMethod, EntryStream},
    directory::{CentralDirectoryParser, CentralDirectoryVisitor},
    entry::{Entry, EntryRecord, SEPARATOR},
    error::{Error, Result},
    index::{EntryIndex, EntryIndexBuilder},
    manifest::{Manifest, ManifestCache, MANIFEST_NAME},
    options::ArchiveOptions,
    path::JarPath,
    region::{RandomAccessRegion, ReadAt, ResourceAccess, RootFile},
    types::{CentralDirectoryFileHeader, LocalFileHeader},
};

const META_INF: &[u8] = b"META-INF/";
const SIGNATURE_FILE_EXTENSION: &[u8] = b".SF";

fn is_signature_file(name: &[u8]) -> bool {
    name.starts_with(META_INF) && name.ends_with(SIGNATURE_FILE_EXTENSION)
}

#[derive(Default)]
struct SignatureVisitor {
    signed: bool,
}

impl CentralDirectoryVisitor for SignatureVisitor {
    fn visit_file_header(&mut self, header: &CentralDirectoryFileHeader, _header_offset: u64) {
        self.signed |= is_signature_file(&header.name);
    }
}

/// State shared by an archive and the directory views derived from it
#[derive(Debug)]
struct Shared {
    comment: Box<[u8]>,
    start_of_archive: u64,
}

/// JAR archive reader
///
/// An archive is a view over shared bytes: a file on disk, an archive stored inside another
/// archive, or a directory of another archive. Views derived with
/// [`JarArchive::nested_archive`] read from the same source and never copy it.
///
/// ```no_run
/// fn list_jar_contents(path: &str) -> bootjar_archive::error::Result<()> {
///     let jar = bootjar_archive::JarArchive::open(path)?;
///
///     for entry in jar.entries() {
///         println!("Filename: {}", entry.name_lossy());
///         if !entry.is_directory() {
///             std::io::copy(&mut jar.open_stream(&entry)?, &mut std::io::stdout())?;
///         }
///     }
///
///     jar.close()
/// }
/// ```
pub struct JarArchive {
    root: Arc<dyn ReadAt>,
    owner: bool,
    path: JarPath,
    data: RandomAccessRegion,
    entries: EntryIndex,
    signed: OnceLock<bool>,
    shared: Arc<Shared>,
    manifest: ManifestCache,
    options: ArchiveOptions,
}

impl Debug for JarArchive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JarArchive")
            .field("name", &self.name())
            .field("entries", &self.len())
            .field("data", &self.data)
            .field("owner", &self.owner)
            .finish()
    }
}

impl JarArchive {
    /// Open the archive at `path` with default options
    pub fn open(path: impl AsRef<Path>) -> Result<JarArchive> {
        Self::open_with(path, ArchiveOptions::default())
    }

    /// Open the archive at `path`
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open_with(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<JarArchive> {
        let path = path.as_ref();
        let root: Arc<dyn ReadAt> = Arc::new(RootFile::open(path)?);
        Self::from_source(root, JarPath::new(path), options)
    }

    /// Read an archive held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<JarArchive> {
        Self::from_source(
            Arc::new(bytes),
            JarPath::default(),
            ArchiveOptions::default(),
        )
    }

    /// Read an archive from any source, which this archive then owns.
    pub fn from_source(
        source: Arc<dyn ReadAt>,
        path: JarPath,
        options: ArchiveOptions,
    ) -> Result<JarArchive> {
        let data = RandomAccessRegion::new(source.clone());
        let mut archive = Self::parse(source, data, path, options)?;
        archive.owner = true;
        Ok(archive)
    }

    /// Open the archive addressed by `path`, descending through every nested segment.
    ///
    /// A segment that is not an entry but is the name of a directory without its trailing
    /// `/` opens the directory view. The returned archive owns the root file.
    #[instrument(skip_all, fields(path = %path), err)]
    pub fn open_path(path: &JarPath, options: ArchiveOptions) -> Result<JarArchive> {
        let mut archive = Self::open_with(path.root(), options)?;
        for segment in path.nested() {
            let nested = archive.nested_archive_by_name(segment)?;
            archive = nested;
        }
        archive.owner = true;
        Ok(archive)
    }

    fn parse(
        root: Arc<dyn ReadAt>,
        data: RandomAccessRegion,
        path: JarPath,
        options: ArchiveOptions,
    ) -> Result<JarArchive> {
        let mut index = EntryIndexBuilder::new();
        let mut signature = SignatureVisitor::default();
        let parsed = CentralDirectoryParser::new()
            .add_visitor(&mut index)
            .add_visitor(&mut signature)
            .parse(&data, &options)?;

        let entries = index.build();
        debug!(
            name = %path,
            entries = entries.len(),
            signed = signature.signed,
            "opened archive"
        );

        Ok(JarArchive {
            root,
            owner: false,
            path,
            data: parsed.data,
            entries,
            signed: OnceLock::from(signature.signed),
            shared: Arc::new(Shared {
                comment: parsed.end.comment().into(),
                start_of_archive: parsed.start_of_archive,
            }),
            manifest: ManifestCache::new(),
            options,
        })
    }

    /// Number of entries visible in this archive
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in central directory order
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.entries.iter()
    }

    /// Returns an iterator over all the file and directory names in this archive.
    pub fn entry_names(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.entries
            .iter()
            .map(|entry| entry.into_name().into_owned())
    }

    /// The index backing this archive
    pub fn index(&self) -> &EntryIndex {
        &self.entries
    }

    /// Look up an entry by its exact name
    pub fn entry(&self, name: impl AsRef<[u8]>) -> Option<Entry<'_>> {
        self.entries.get(name.as_ref())
    }

    /// Whether an entry with this exact name exists
    pub fn contains_entry(&self, name: impl AsRef<[u8]>) -> bool {
        self.entries.contains(name.as_ref())
    }

    /// Search for an entry by name
    pub fn by_name(&self, name: &str) -> Result<Entry<'_>> {
        self.entry(name).ok_or_else(|| self.not_found(name))
    }

    /// Open a stream over the uncompressed content of `entry`, read from this archive.
    pub fn open_stream(&self, entry: &Entry<'_>) -> Result<EntryStream> {
        self.open_stream_with(entry, ResourceAccess::Once)
    }

    /// Open a stream over the entry called `name`
    pub fn open_stream_by_name(&self, name: &str) -> Result<EntryStream> {
        let entry = self.by_name(name)?;
        self.open_stream(&entry)
    }

    fn open_stream_with(&self, entry: &Entry<'_>, access: ResourceAccess) -> Result<EntryStream> {
        let record = entry.record();
        if record.is_encrypted() {
            return Err(Error::unsupported_entry(
                entry.name(),
                "encrypted entries are not supported",
            ));
        }
        if let CompressionMethod::Unsupported(method) = record.compression_method {
            return Err(Error::unsupported_entry(
                entry.name(),
                format!("compression method {method} is not supported"),
            ));
        }

        let data = self.entry_data(entry)?;
        Ok(EntryStream::new(
            data.open_stream(access, self.options.buffer_capacity),
            record.compression_method,
            record.uncompressed_size,
            self.options.verify_checksums.then_some(record.crc32),
        ))
    }

    /// The stored bytes of `entry`, still compressed if the entry is
    pub fn entry_data(&self, entry: &Entry<'_>) -> Result<RandomAccessRegion> {
        let record = entry.record();
        self.data
            .subsection(self.data_offset(record)?, record.compressed_size)
    }

    /// Offset of the entry's data from the start of the archive, read from its local header
    pub fn data_offset(&self, record: &EntryRecord) -> Result<u64> {
        let local = self
            .data
            .subsection(record.local_header_offset, LocalFileHeader::SIZE)?;
        let header = LocalFileHeader::read(&mut local.reader())?;
        Ok(record.local_header_offset + header.data_offset())
    }

    /// Open `entry` as an archive of its own.
    ///
    /// A directory entry gives a view of its descendants with the directory prefix removed
    /// from their names. A file entry must be stored uncompressed, its bytes are then parsed
    /// as an archive in place.
    #[instrument(skip_all, fields(archive = %self.path, entry = %entry.name_lossy()), err)]
    pub fn nested_archive(&self, entry: &Entry<'_>) -> Result<JarArchive> {
        if entry.is_directory() {
            return Ok(self.directory_view(entry));
        }

        let record = entry.record();
        if record.compression_method != CompressionMethod::Stored {
            return Err(Error::unsupported_entry(
                entry.name(),
                "nested archive entries must be stored uncompressed",
            ));
        }
        if record.is_encrypted() {
            return Err(Error::unsupported_entry(
                entry.name(),
                "encrypted entries are not supported",
            ));
        }

        let name = entry.name_lossy().into_owned();
        let path = self.path.join(name.clone());
        self.entry_data(entry)
            .and_then(|data| Self::parse(self.root.clone(), data, path, self.options))
            .map_err(|source| Error::NestedArchive {
                name,
                source: Box::new(source),
            })
    }

    /// Open the entry called `name` as an archive, see [`JarArchive::nested_archive`].
    ///
    /// `name` may leave out the trailing `/` of a directory.
    pub fn nested_archive_by_name(&self, name: &str) -> Result<JarArchive> {
        if let Some(entry) = self.entry(name) {
            return self.nested_archive(&entry);
        }
        if !name.ends_with(SEPARATOR as char) {
            if let Some(entry) = self.entry(format!("{name}/")) {
                return self.nested_archive(&entry);
            }
        }
        Err(self.not_found(name))
    }

    fn not_found(&self, name: &str) -> Error {
        Error::EntryNotFound(format!("{}{}{name}", self.path, crate::path::SEPARATOR))
    }

    fn directory_view(&self, entry: &Entry<'_>) -> JarArchive {
        let name = entry.name_lossy();
        let path = self
            .path
            .join(name.strip_suffix(SEPARATOR as char).unwrap_or(&*name));
        debug!(name = %path, "opened directory view");

        JarArchive {
            root: self.root.clone(),
            owner: false,
            path,
            data: self.data.clone(),
            entries: self.entries.subtree(entry.name()),
            signed: OnceLock::new(),
            shared: self.shared.clone(),
            manifest: ManifestCache::new(),
            options: self.options,
        }
    }

    /// A view of this archive whose entries are renamed by `rename`.
    ///
    /// Entries for which `rename` returns `None` are hidden.
    pub fn renamed<F>(&self, rename: F) -> JarArchive
    where
        F: Fn(&[u8], &EntryRecord) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        JarArchive {
            root: self.root.clone(),
            owner: false,
            path: self.path.clone(),
            data: self.data.clone(),
            entries: self.entries.renamed(rename),
            signed: OnceLock::new(),
            shared: self.shared.clone(),
            manifest: ManifestCache::new(),
            options: self.options,
        }
    }

    /// The parsed `META-INF/MANIFEST.MF`, if this archive has one
    pub fn manifest(&self) -> Result<Option<Arc<Manifest>>> {
        self.manifest.get_or_load(|| {
            let Some(entry) = self.entry(MANIFEST_NAME) else {
                return Ok(None);
            };
            let stream = self.open_stream_with(&entry, ResourceAccess::Repeatable)?;
            Manifest::read(stream).map(Some)
        })
    }

    /// Drop the cached manifest
    pub fn invalidate_manifest(&self) {
        self.manifest.invalidate();
    }

    /// Whether the archive holds a `META-INF/*.SF` signature file
    ///
    /// Known from the central directory pass for parsed archives, derived views scan their
    /// entries on first call.
    pub fn is_signed(&self) -> bool {
        *self
            .signed
            .get_or_init(|| self.entries.iter().any(|e| is_signature_file(e.name())))
    }

    /// Path of this archive from the root file
    pub fn path(&self) -> &JarPath {
        &self.path
    }

    /// Root file path followed by the entries leading to this archive,
    /// e.g. `/srv/app.jar!/lib/inner.jar`
    pub fn name(&self) -> String {
        self.path.to_string()
    }

    /// `jar:file:` URL of this archive
    pub fn url(&self) -> Result<String> {
        self.path.to_url()
    }

    /// Size of the archive bytes, excluding any prefix
    pub fn size(&self) -> u64 {
        self.data.size()
    }

    /// Number of bytes in front of the archive within its container
    pub fn start_of_archive(&self) -> u64 {
        self.shared.start_of_archive
    }

    /// The archive comment
    pub fn comment(&self) -> &[u8] {
        &self.shared.comment
    }

    /// Options this archive was opened with
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// The bytes of this archive
    pub fn data(&self) -> &RandomAccessRegion {
        &self.data
    }

    /// Total size of the files in the archive, if it can be known. Doesn't include
    /// metadata.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for entry in self.entries() {
            total = total.checked_add(entry.size() as u128)?;
        }
        Some(total)
    }

    /// Whether closing this archive releases the root source
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Release the root source. Does nothing on views that do not own it.
    ///
    /// Views derived from an owner fail to read once it is closed.
    pub fn close(&self) -> Result<()> {
        if self.owner {
            debug!(name = %self.path, "closing archive");
            self.root.close()?;
        }
        Ok(())
    }
}
