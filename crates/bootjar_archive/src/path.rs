//! Addressing of archives nested inside other archives.
//!
//! Two notations are understood:
//!
//! | Form  | Example                                        | Segments                         |
//! |-------|------------------------------------------------|----------------------------------|
//! | plain | `app.jar!/lib/inner.jar!/`                     | every segment is an archive      |
//! | url   | `jar:file:/srv/app.jar!/lib/inner.jar!/a.txt`  | the last segment is the resource |
//!
//! Segments are separated by `!/`. A segment naming a directory opens a directory view.

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Separator between the segments of a nested path
pub const SEPARATOR: &str = "!/";

const URL_PREFIX: &str = "jar:";
const FILE_PREFIX: &str = "file:";

/// A root file followed by the chain of entries leading to a nested archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JarPath {
    root: PathBuf,
    nested: Vec<String>,
    entry: Option<String>,
}

impl JarPath {
    /// A path to the root archive itself
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JarPath {
            root: root.into(),
            nested: Vec::new(),
            entry: None,
        }
    }

    /// Parse either notation
    pub fn parse(path: &str) -> Result<JarPath> {
        match path.strip_prefix(URL_PREFIX) {
            Some(url) => Self::parse_url(path, url),
            None => Self::parse_plain(path),
        }
    }

    fn parse_plain(path: &str) -> Result<JarPath> {
        let mut segments = path.split(SEPARATOR);
        let root = segments.next().unwrap_or_default();
        if root.is_empty() {
            return Err(Error::InvalidPath(path.to_owned()));
        }
        let mut nested = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                // only a trailing separator may be empty
                continue;
            }
            nested.push(segment.to_owned());
        }
        if path.contains("!/!/") {
            return Err(Error::InvalidPath(path.to_owned()));
        }
        Ok(JarPath {
            root: PathBuf::from(root),
            nested,
            entry: None,
        })
    }

    fn parse_url(original: &str, url: &str) -> Result<JarPath> {
        let invalid = || Error::InvalidPath(original.to_owned());
        let file = url.strip_prefix(FILE_PREFIX).ok_or_else(invalid)?;
        // file:///path and file://localhost/path carry an empty or local authority
        let file = match file.strip_prefix("//") {
            Some(rest) => {
                let slash = rest.find('/').ok_or_else(invalid)?;
                let authority = &rest[..slash];
                if !authority.is_empty() && authority != "localhost" {
                    return Err(invalid());
                }
                &rest[slash..]
            }
            None => file,
        };

        let mut segments = file.split(SEPARATOR).collect::<Vec<_>>();
        if segments.len() < 2 {
            return Err(invalid());
        }
        let root = percent_decode(segments.remove(0)).ok_or_else(invalid)?;
        let last = segments.pop().unwrap_or_default();
        let nested = segments
            .into_iter()
            .map(|segment| match segment {
                "" => None,
                segment => percent_decode(segment),
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        let entry = match last {
            "" => None,
            last => Some(percent_decode(last).ok_or_else(invalid)?),
        };
        if root.is_empty() {
            return Err(invalid());
        }

        Ok(JarPath {
            root: PathBuf::from(root),
            nested,
            entry,
        })
    }

    /// The file at the root of the chain
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the entries to descend through, outermost first
    pub fn nested(&self) -> &[String] {
        &self.nested
    }

    /// The resource addressed inside the innermost archive, if any
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// The same path one level deeper
    pub fn join(&self, segment: impl Into<String>) -> JarPath {
        let mut nested = self.nested.clone();
        nested.push(segment.into());
        JarPath {
            root: self.root.clone(),
            nested,
            entry: None,
        }
    }

    /// The same path addressing `entry` inside the innermost archive
    pub fn with_entry(&self, entry: impl Into<String>) -> JarPath {
        JarPath {
            entry: Some(entry.into()),
            ..self.clone()
        }
    }

    /// Segments after the root, as they appear in [`Display`]: `!/a.jar!/b`
    pub fn path_from_root(&self) -> String {
        self.nested
            .iter()
            .map(|segment| format!("{SEPARATOR}{segment}"))
            .collect()
    }

    /// The `jar:file:` URL of the innermost archive, or of [`JarPath::entry`] when set.
    ///
    /// A relative root is resolved against the current directory.
    pub fn to_url(&self) -> Result<String> {
        let root = if self.root.is_absolute() {
            self.root.clone()
        } else {
            std::env::current_dir()?.join(&self.root)
        };
        let mut root = root.to_string_lossy().replace('\\', "/");
        if !root.starts_with('/') {
            root.insert(0, '/');
        }

        let mut url = format!("{URL_PREFIX}{FILE_PREFIX}{}", percent_encode(&root));
        for segment in &self.nested {
            url.push_str(SEPARATOR);
            url.push_str(&percent_encode(segment));
        }
        url.push_str(SEPARATOR);
        if let Some(entry) = &self.entry {
            url.push_str(&percent_encode(entry));
        }
        Ok(url)
    }
}

impl Display for JarPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.root.display(), self.path_from_root())?;
        if let Some(entry) = &self.entry {
            write!(f, "{SEPARATOR}{entry}")?;
        }
        Ok(())
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'/'
            | b'-'
            | b'_'
            | b'.'
            | b'~'
            | b':'
            | b'$'
            | b'+'
            | b'@' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn percent_decode(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = value.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
