//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// The bytes do not form a readable archive
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// The archive uses structures this library refuses to read
    #[error("unsupported archive: {0}")]
    #[diagnostic(help("ZIP64 archives (more than 65535 entries or 4 GiB) are not supported"))]
    UnsupportedArchive(String),

    /// The entry cannot be used in the requested way
    #[error("unsupported entry '{name}': {reason}")]
    UnsupportedEntry {
        /// name of the entry
        name: String,
        /// why the entry was refused
        reason: String,
    },

    /// A region was requested outside of its parent's bounds
    #[error("range {offset}+{length} exceeds region of {size} bytes")]
    Range {
        /// requested start, relative to the parent region
        offset: u64,
        /// requested length
        length: u64,
        /// size of the parent region
        size: u64,
    },

    /// unable to find requested entry
    #[error("unable to find requested entry {0}")]
    EntryNotFound(String),

    /// The manifest could not be parsed
    #[error("invalid manifest at line {line}: {reason}")]
    InvalidManifest {
        /// 1-based line number
        line: usize,
        /// what was wrong with the line
        reason: String,
    },

    /// A nested archive path could not be understood
    #[error("invalid archive path '{0}'")]
    InvalidPath(String),

    /// The bytes of a nested entry could not be read as an archive
    #[error("unable to open nested archive '{name}'")]
    NestedArchive {
        /// name of the entry holding the nested archive
        name: String,
        /// underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl From<binrw::Error> for Error {
    fn from(value: binrw::Error) -> Self {
        match value {
            binrw::Error::Io(err) => Error::IOError(err),
            binrw::Error::BadMagic { pos, .. } => {
                Error::MalformedArchive(format!("bad signature at offset {pos}"))
            }
            other => Error::MalformedArchive(other.to_string()),
        }
    }
}

impl Error {
    pub(crate) fn unsupported_entry(name: &[u8], reason: impl Into<String>) -> Self {
        Error::UnsupportedEntry {
            name: String::from_utf8_lossy(name).into_owned(),
            reason: reason.into(),
        }
    }

    /// Returns the innermost error, looking through [`Error::NestedArchive`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::NestedArchive { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
