//! Tunables shared by an archive and every view derived from it.

use bon::Builder;

use crate::eocd::DEFAULT_READ_BLOCK_SIZE;

/// Default buffer size of [`crate::ResourceAccess::Once`] streams
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Options for opening an archive
///
/// ```
/// use bootjar_archive::ArchiveOptions;
///
/// let options = ArchiveOptions::builder().verify_checksums(true).build();
/// assert_eq!(options.eocd_block_size, 256);
/// ```
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Size of the first window read when looking for the end record, and of every growth step
    #[builder(default = DEFAULT_READ_BLOCK_SIZE)]
    pub eocd_block_size: usize,

    /// Buffer size for sequential streams
    #[builder(default = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_capacity: usize,

    /// Check the CRC-32 of every entry when its stream is read to the end
    #[builder(default)]
    pub verify_checksums: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions::builder().build()
    }
}
