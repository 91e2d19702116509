//! This library handles random-access reading of **JAR** and **ZIP** archives, including archives
//! nested inside other archives.
//!
//! # Nested JAR Format Documentation
//!
//! An executable JAR commonly bundles its dependencies as complete JAR files stored inside it,
//! and may itself be appended to a launch script. This crate opens such archives in place: a
//! nested archive is parsed straight from the bytes of its parent and nothing is extracted to
//! disk. A directory of an archive can be opened the same way, as an archive holding the
//! directory's descendants.
//!
//! ## File Structure
//!
//! A ZIP file is a sequence of entries, each a local file header followed by the entry data,
//! then the central directory describing every entry, then the end of central directory
//! record. All multi-byte integers are little endian.
//!
//! ### End of Central Directory Record
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Signature              | 4 bytes: 0x06054b50 ("PK\x05\x06")                         |
//! | 0x0004         | Disk Number            | 2 bytes: Number of this disk                               |
//! | 0x0006         | Directory Disk         | 2 bytes: Disk where the central directory starts           |
//! | 0x0008         | Disk Entries           | 2 bytes: Number of records on this disk                    |
//! | 0x000A         | Total Entries          | 2 bytes: Total number of records                           |
//! | 0x000C         | Directory Size         | 4 bytes: Size of the central directory                     |
//! | 0x0010         | Directory Offset       | 4 bytes: Offset of the central directory                   |
//! | 0x0014         | Comment Length         | 2 bytes: Length of the comment that follows                |
//!
//! The record sits at the very end of the file but is followed by a comment of up to 65535
//! bytes. It is found by scanning backwards for a signature whose comment length matches the
//! number of bytes left after the record.
//!
//! The **Directory Offset** is recorded relative to the start of the archive. When the archive
//! has been appended to other data the central directory actually starts later, and the
//! difference between the actual and the recorded position is the length of that prefix.
//!
//! ### Central Directory File Header
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Signature              | 4 bytes: 0x02014b50 ("PK\x01\x02")                      |
//! | 0x0004         | Version Made By        | 2 bytes                                                 |
//! | 0x0006         | Version Needed         | 2 bytes                                                 |
//! | 0x0008         | Flags                  | 2 bytes: Bit 0 set for encrypted entries                |
//! | 0x000A         | Compression            | 2 bytes: `0` stored, `8` deflated                       |
//! | 0x000C         | Modification Time      | 2 bytes: DOS time                                       |
//! | 0x000E         | Modification Date      | 2 bytes: DOS date                                       |
//! | 0x0010         | CRC32                  | 4 bytes: CRC-32 of the uncompressed data                |
//! | 0x0014         | Compressed Size        | 4 bytes                                                 |
//! | 0x0018         | Uncompressed Size      | 4 bytes                                                 |
//! | 0x001C         | Name Length            | 2 bytes                                                 |
//! | 0x001E         | Extra Length           | 2 bytes                                                 |
//! | 0x0020         | Comment Length         | 2 bytes                                                 |
//! | 0x0022         | Disk Start             | 2 bytes                                                 |
//! | 0x0024         | Internal Attributes    | 2 bytes                                                 |
//! | 0x0026         | External Attributes    | 4 bytes                                                 |
//! | 0x002A         | Local Header Offset    | 4 bytes: Offset of the local header from the archive start |
//!
//! The 46 fixed bytes are followed by the name, the extra field and the comment.
//!
//! ### Local File Header
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Signature              | 4 bytes: 0x04034b50 ("PK\x03\x04")                      |
//! | 0x0004         | Version Needed         | 2 bytes                                                 |
//! | 0x0006         | Flags                  | 2 bytes                                                 |
//! | 0x0008         | Compression            | 2 bytes                                                 |
//! | 0x000A         | Modification Time      | 2 bytes                                                 |
//! | 0x000C         | Modification Date      | 2 bytes                                                 |
//! | 0x000E         | CRC32                  | 4 bytes                                                 |
//! | 0x0012         | Compressed Size        | 4 bytes                                                 |
//! | 0x0016         | Uncompressed Size      | 4 bytes                                                 |
//! | 0x001A         | Name Length            | 2 bytes                                                 |
//! | 0x001C         | Extra Length           | 2 bytes                                                 |
//!
//! The entry data starts right after the name and extra field of the local header. Their
//! lengths may differ from the ones in the central directory, so the local header is always
//! read to find the data.
//!
//! ## Nested Archives
//!
//! - A **stored** entry holding an archive is opened by parsing its data in place.
//! - A **deflated** entry cannot be read in place and is refused.
//! - A **directory** entry (its name ends with `/`) opens a view of its descendants, with the
//!   directory prefix removed from their names.
//!
//! Nested archives are addressed with `!/` separated paths such as
//! `app.jar!/lib/inner.jar!/`, or with `jar:file:` URLs, see [`JarPath`].
//!
//! ## Additional Information
//!
//! - **File Extension**: `.jar`, `.zip`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression Methods**:
//!   - `0`: Stored (no compression)
//!   - `8`: Deflated (raw deflate stream)
//! - **ZIP64**: detected and refused
//!

pub mod compression;
pub mod directory;
pub mod entry;
pub mod eocd;
pub mod error;
pub mod index;
pub mod manifest;
pub mod options;
pub mod path;
pub mod read;
pub mod region;
pub mod types;

pub use compression::{CompressionMethod, EntryStream};
pub use entry::{Entry, EntryRecord};
pub use index::{EntryFilter, EntryIndex};
pub use manifest::{Manifest, ManifestCache};
pub use options::ArchiveOptions;
pub use path::JarPath;
pub use read::JarArchive;
pub use region::{RandomAccessRegion, ReadAt, ResourceAccess};
