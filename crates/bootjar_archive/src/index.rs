//! Name keyed lookup of the entries of an archive view.
//!
//! An index is either the [`RootEntries`] built from one parse of a central directory, or a
//! [`FilteredEntries`] view that renames and filters a parent index. Filtered views never
//! copy records and only materialize what they need on first use.
//!
//! Names are compared as raw bytes, exactly and case sensitively. When a central directory
//! holds the same name twice the first record wins and later ones are not visible at all,
//! neither by lookup nor by enumeration.

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

use indexmap::map::Entry as MapEntry;
use indexmap::IndexMap;
use tracing::{instrument, warn};

use crate::directory::CentralDirectoryVisitor;
use crate::entry::{Entry, EntryRecord};
use crate::types::CentralDirectoryFileHeader;

/// Decides the name of a parent entry within a derived index, `None` hides the entry
pub type RenameFn = dyn Fn(&[u8], &EntryRecord) -> Option<Vec<u8>> + Send + Sync;

/// Entries of a parsed central directory, in central directory order
#[derive(Debug, Default)]
pub struct RootEntries {
    records: IndexMap<Box<[u8]>, EntryRecord>,
}

impl RootEntries {
    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn get(&self, name: &[u8]) -> Option<Entry<'_>> {
        self.records
            .get_key_value(name)
            .map(|(key, record)| Entry::new(Cow::Borrowed(key), record))
    }

    fn iter(&self) -> impl Iterator<Item = Entry<'_>> {
        self.records
            .iter()
            .map(|(key, record)| Entry::new(Cow::Borrowed(key), record))
    }
}

/// How a [`FilteredEntries`] derives its names from its parent
#[derive(Clone)]
pub enum EntryFilter {
    /// Descendants of a directory, with the directory prefix (including its trailing `/`)
    /// removed. The directory entry itself is excluded.
    Subtree(Box<[u8]>),

    /// Arbitrary renaming
    Rename(Arc<RenameFn>),
}

impl Debug for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntryFilter::Subtree(prefix) => {
                write!(f, "Subtree({:?})", String::from_utf8_lossy(prefix))
            }
            EntryFilter::Rename(_) => write!(f, "Rename(..)"),
        }
    }
}

/// A renamed and filtered view of a parent index
#[derive(Debug)]
pub struct FilteredEntries {
    parent: EntryIndex,
    filter: EntryFilter,
    /// new name to parent name, built on first use by [`EntryFilter::Rename`]
    renamed: OnceLock<IndexMap<Box<[u8]>, Box<[u8]>>>,
    len: OnceLock<usize>,
}

impl FilteredEntries {
    fn renamed(&self, rename: &RenameFn) -> &IndexMap<Box<[u8]>, Box<[u8]>> {
        self.renamed.get_or_init(|| {
            let mut names = IndexMap::new();
            for entry in self.parent.iter() {
                if let Some(new_name) = rename(entry.name(), entry.record()) {
                    names
                        .entry(new_name.into_boxed_slice())
                        .or_insert_with(|| entry.name().into());
                }
            }
            names
        })
    }

    fn get(&self, name: &[u8]) -> Option<Entry<'_>> {
        match &self.filter {
            EntryFilter::Subtree(prefix) => {
                if name.is_empty() {
                    return None;
                }
                let mut full = Vec::with_capacity(prefix.len() + name.len());
                full.extend_from_slice(prefix);
                full.extend_from_slice(name);
                self.parent
                    .get(&full)
                    .map(|entry| strip_prefix(entry, prefix.len()))
            }
            EntryFilter::Rename(rename) => {
                let (key, parent_name) = self.renamed(rename.as_ref()).get_key_value(name)?;
                let parent = self.parent.get(parent_name)?;
                Some(Entry::new(Cow::Borrowed(key), parent.record()))
            }
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Entry<'_>> + '_> {
        match &self.filter {
            EntryFilter::Subtree(prefix) => Box::new(
                self.parent
                    .iter()
                    .filter(|entry| {
                        entry.name().len() > prefix.len() && entry.name().starts_with(prefix)
                    })
                    .map(|entry| strip_prefix(entry, prefix.len())),
            ),
            EntryFilter::Rename(rename) => Box::new(
                self.renamed(rename.as_ref())
                    .iter()
                    .filter_map(|(key, parent_name)| {
                        self.parent
                            .get(parent_name)
                            .map(|parent| Entry::new(Cow::Borrowed(key), parent.record()))
                    }),
            ),
        }
    }

    fn len(&self) -> usize {
        *self.len.get_or_init(|| self.iter().count())
    }
}

fn strip_prefix(entry: Entry<'_>, length: usize) -> Entry<'_> {
    let record = entry.record();
    let name = match entry.into_name() {
        Cow::Borrowed(name) => Cow::Borrowed(&name[length..]),
        Cow::Owned(name) => Cow::Owned(name[length..].to_vec()),
    };
    Entry::new(name, record)
}

/// The entries visible through one archive view
#[derive(Debug, Clone)]
pub enum EntryIndex {
    /// Entries of a parsed central directory
    Root(Arc<RootEntries>),
    /// A derived view of another index
    Filtered(Arc<FilteredEntries>),
}

impl Default for EntryIndex {
    fn default() -> Self {
        EntryIndex::Root(Arc::default())
    }
}

impl EntryIndex {
    /// Number of visible entries
    pub fn len(&self) -> usize {
        match self {
            EntryIndex::Root(root) => root.len(),
            EntryIndex::Filtered(filtered) => filtered.len(),
        }
    }

    /// Whether no entry is visible
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry by its exact name
    pub fn get(&self, name: &[u8]) -> Option<Entry<'_>> {
        match self {
            EntryIndex::Root(root) => root.get(name),
            EntryIndex::Filtered(filtered) => filtered.get(name),
        }
    }

    /// Whether an entry with this exact name is visible
    pub fn contains(&self, name: &[u8]) -> bool {
        self.get(name).is_some()
    }

    /// Visible entries, in central directory order
    pub fn iter(&self) -> Box<dyn Iterator<Item = Entry<'_>> + '_> {
        match self {
            EntryIndex::Root(root) => Box::new(root.iter()),
            EntryIndex::Filtered(filtered) => filtered.iter(),
        }
    }

    /// Derive an index through `filter`
    pub fn filtered(&self, filter: EntryFilter) -> EntryIndex {
        EntryIndex::Filtered(Arc::new(FilteredEntries {
            parent: self.clone(),
            filter,
            renamed: OnceLock::new(),
            len: OnceLock::new(),
        }))
    }

    /// Derive the index of the directory `prefix`, which must end with `/`
    pub fn subtree(&self, prefix: &[u8]) -> EntryIndex {
        self.filtered(EntryFilter::Subtree(prefix.into()))
    }

    /// Derive an index with names decided by `rename`
    pub fn renamed<F>(&self, rename: F) -> EntryIndex
    where
        F: Fn(&[u8], &EntryRecord) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        self.filtered(EntryFilter::Rename(Arc::new(rename)))
    }
}

/// Builds a [`RootEntries`] index while a central directory is parsed
#[derive(Debug, Default)]
pub struct EntryIndexBuilder {
    records: IndexMap<Box<[u8]>, EntryRecord>,
    duplicates: usize,
}

impl EntryIndexBuilder {
    /// A builder without entries
    pub fn new() -> Self {
        EntryIndexBuilder::default()
    }

    /// Number of records that were dropped because their name was already taken
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Finish the index
    #[instrument(skip_all, fields(entries = self.records.len()))]
    pub fn build(self) -> EntryIndex {
        EntryIndex::Root(Arc::new(RootEntries {
            records: self.records,
        }))
    }
}

impl CentralDirectoryVisitor for EntryIndexBuilder {
    fn visit_file_header(&mut self, header: &CentralDirectoryFileHeader, header_offset: u64) {
        match self.records.entry(header.name.as_slice().into()) {
            MapEntry::Vacant(slot) => {
                slot.insert(EntryRecord::from_header(header, header_offset));
            }
            MapEntry::Occupied(_) => {
                self.duplicates += 1;
                warn!(
                    name = %String::from_utf8_lossy(&header.name),
                    header_offset,
                    "ignoring duplicate entry, the first one with this name is kept"
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::directory::CentralDirectoryVisitor;
    use crate::index::{EntryIndex, EntryIndexBuilder};
    use crate::types::CentralDirectoryFileHeader;

    fn index(names: &[&str]) -> (EntryIndex, usize) {
        let mut builder = EntryIndexBuilder::new();
        let mut offset = 0;
        for (i, name) in names.iter().enumerate() {
            let header = CentralDirectoryFileHeader {
                name_length: name.len() as u16,
                name: name.as_bytes().to_vec(),
                crc32: i as u32,
                ..Default::default()
            };
            builder.visit_file_header(&header, offset);
            offset += header.total_size();
        }
        let duplicates = builder.duplicates();
        (builder.build(), duplicates)
    }

    fn names(index: &EntryIndex) -> Vec<String> {
        index.iter().map(|e| e.name_lossy().into_owned()).collect()
    }

    #[test]
    fn lookup_is_exact() {
        let (index, _) = index(&["META-INF/MANIFEST.MF", "a.txt"]);

        assert!(index.contains(b"a.txt"));
        assert!(!index.contains(b"A.TXT"));
        assert!(!index.contains(b"a.tx"));
        assert_eq!(index.get(b"a.txt").map(|e| e.crc32()), Some(1));
    }

    #[test]
    fn enumeration_keeps_directory_order() {
        let (index, _) = index(&["z", "a", "m/", "m/b"]);

        assert_eq!(index.len(), 4);
        assert_eq!(names(&index), vec!["z", "a", "m/", "m/b"]);
        for entry in index.iter() {
            assert!(index.contains(entry.name()));
        }
    }

    #[traced_test]
    #[test]
    fn first_duplicate_wins() {
        let (index, duplicates) = index(&["a.txt", "b.txt", "a.txt"]);

        assert_eq!(duplicates, 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(b"a.txt").map(|e| e.crc32()), Some(0));
        assert_eq!(names(&index), vec!["a.txt", "b.txt"]);
        assert!(logs_contain("ignoring duplicate entry"));
    }

    #[test]
    fn subtree_strips_prefix_and_excludes_directory() {
        let (index, _) = index(&[
            "lib/",
            "lib/foo.txt",
            "lib/sub/",
            "lib/sub/bar.txt",
            "other.txt",
        ]);
        let lib = index.subtree(b"lib/");

        assert_eq!(names(&lib), vec!["foo.txt", "sub/", "sub/bar.txt"]);
        assert_eq!(lib.len(), 3);
        assert!(lib.contains(b"foo.txt"));
        assert!(!lib.contains(b""));
        assert!(!lib.contains(b"other.txt"));
        assert_eq!(
            lib.get(b"foo.txt").map(|e| e.record().name.to_vec()),
            Some(b"lib/foo.txt".to_vec())
        );
    }

    #[test]
    fn nested_subtrees_compose() {
        let (index, _) = index(&["a/", "a/b/", "a/b/c.txt"]);
        let b = index.subtree(b"a/").subtree(b"b/");

        assert_eq!(names(&b), vec!["c.txt"]);
        assert!(b.contains(b"c.txt"));
    }

    #[test]
    fn rename_filters_and_renames() {
        let (index, _) = index(&["keep.txt", "drop.bin", "also.txt"]);
        let upper = index.renamed(|name, _| {
            let upper = name.to_ascii_uppercase();
            name.ends_with(b".txt").then_some(upper)
        });

        assert_eq!(names(&upper), vec!["KEEP.TXT", "ALSO.TXT"]);
        assert_eq!(upper.len(), 2);
        assert_eq!(upper.get(b"ALSO.TXT").map(|e| e.crc32()), Some(2));
        assert!(!upper.contains(b"keep.txt"));
    }
}
