//! Parsing and caching of `META-INF/MANIFEST.MF`.
//!
//! A manifest is a list of sections separated by blank lines. Each section is a list of
//! `Name: value` headers, a line starting with a single space continues the value of the
//! previous header. The first section holds the main attributes, every other section starts
//! with a `Name` header naming the entry it describes.

use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Name of the manifest entry
pub const MANIFEST_NAME: &[u8] = b"META-INF/MANIFEST.MF";

/// Version of the manifest format
pub const MANIFEST_VERSION: &str = "Manifest-Version";

/// Class launched by `java -jar`
pub const MAIN_CLASS: &str = "Main-Class";

/// Application class started by a launcher
pub const START_CLASS: &str = "Start-Class";

/// Header introducing a per-entry section
pub const SECTION_NAME: &str = "Name";

/// A group of headers, looked up case insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    /// lowercased name to (name as written, value)
    values: IndexMap<String, (String, String)>,
}

impl Attributes {
    /// Value of the header `name`, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any value it had
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.values
            .insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    /// Headers in the order they were first written
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no headers
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    sections: IndexMap<String, Attributes>,
}

impl Manifest {
    /// Parse a manifest from a reader
    pub fn read(mut reader: impl Read) -> Result<Manifest> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Manifest::parse(&bytes)
    }

    /// Parse a manifest from its bytes
    #[instrument(skip_all, fields(size = bytes.len()), err)]
    pub fn parse(bytes: &[u8]) -> Result<Manifest> {
        let mut manifest = Manifest::default();
        // headers of the section being read, with the line each one started on
        let mut section: Vec<(usize, String, String)> = Vec::new();
        let mut in_main = true;

        for (number, line) in lines(bytes) {
            if line.is_empty() {
                if !section.is_empty() {
                    manifest.close_section(std::mem::take(&mut section), in_main)?;
                }
                // the main section ends at the first blank line, even when it is empty
                in_main = false;
                continue;
            }

            let line = std::str::from_utf8(line).map_err(|_| Error::InvalidManifest {
                line: number,
                reason: "line is not valid UTF-8".into(),
            })?;

            if let Some(continued) = line.strip_prefix(' ') {
                let Some((_, _, value)) = section.last_mut() else {
                    return Err(Error::InvalidManifest {
                        line: number,
                        reason: "continuation line without a header to continue".into(),
                    });
                };
                value.push_str(continued);
                continue;
            }

            let (name, value) = header(line).ok_or_else(|| Error::InvalidManifest {
                line: number,
                reason: format!("expected 'Name: value', found '{line}'"),
            })?;
            section.push((number, name.to_owned(), value.to_owned()));
        }

        if !section.is_empty() {
            manifest.close_section(section, in_main)?;
        }

        debug!(
            main = manifest.main.len(),
            sections = manifest.sections.len(),
            "parsed manifest"
        );
        Ok(manifest)
    }

    fn close_section(&mut self, headers: Vec<(usize, String, String)>, main: bool) -> Result<()> {
        if main {
            for (_, name, value) in headers {
                self.main.insert(name, value);
            }
            return Ok(());
        }

        let mut headers = headers.into_iter();
        let Some((line, name, entry)) = headers.next() else {
            return Ok(());
        };
        if !name.eq_ignore_ascii_case(SECTION_NAME) {
            return Err(Error::InvalidManifest {
                line,
                reason: format!("section must start with '{SECTION_NAME}', found '{name}'"),
            });
        }

        let attributes = self.sections.entry(entry).or_default();
        for (_, name, value) in headers {
            attributes.insert(name, value);
        }
        Ok(())
    }

    /// Attributes of the main section
    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    /// Attributes of the section describing `name`
    pub fn section(&self, name: &str) -> Option<&Attributes> {
        self.sections.get(name)
    }

    /// Per-entry sections in the order they appear
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.sections
            .iter()
            .map(|(name, attrs)| (name.as_str(), attrs))
    }

    /// The `Main-Class` main attribute
    pub fn main_class(&self) -> Option<&str> {
        self.main.get(MAIN_CLASS)
    }

    /// The `Start-Class` main attribute
    pub fn start_class(&self) -> Option<&str> {
        self.main.get(START_CLASS)
    }
}

/// Lines with their 1-based number. `\r\n`, `\n` and `\r` all end a line.
fn lines(bytes: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    let mut rest = bytes;
    let mut number = 0;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        number += 1;
        let end = rest
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .unwrap_or(rest.len());
        let line = &rest[..end];
        let skip = match &rest[end..] {
            [b'\r', b'\n', ..] => 2,
            [] => 0,
            _ => 1,
        };
        rest = &rest[end + skip..];
        Some((number, line))
    })
}

fn header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid_name {
        return None;
    }
    match value.strip_prefix(' ') {
        Some(value) => Some((name, value)),
        None if value.is_empty() => Some((name, value)),
        None => None,
    }
}

/// Memoized manifest of one archive view
///
/// The manifest is parsed without holding the lock, so racing loads may parse it more than
/// once; the first one stored is kept.
#[derive(Debug, Default)]
pub struct ManifestCache {
    cached: RwLock<Option<Arc<Manifest>>>,
}

impl ManifestCache {
    /// A cache holding nothing
    pub fn new() -> Self {
        ManifestCache::default()
    }

    /// Return the cached manifest, or call `load` and cache what it returns.
    ///
    /// A `None` from `load` (no manifest in the archive) is not cached.
    pub fn get_or_load<F>(&self, load: F) -> Result<Option<Arc<Manifest>>>
    where
        F: FnOnce() -> Result<Option<Manifest>>,
    {
        if let Some(manifest) = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Some(manifest.clone()));
        }

        let Some(loaded) = load()? else {
            return Ok(None);
        };

        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Some(cached.get_or_insert_with(|| Arc::new(loaded)).clone()))
    }

    /// Forget the cached manifest, the next access parses it again
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a manifest is currently cached
    pub fn is_cached(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
