use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::{EntryKind, KeyspaceFs};
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::store::KvStore;

/// One immediate child in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl<S: KvStore> KeyspaceFs<S> {
    /// List the immediate children of `path`, sorted by name.
    ///
    /// One prefix scan yields every descendant key. A key with nothing left
    /// after the prefix but a single segment is a file child; a longer one
    /// contributes its first segment as a directory child, once. Registered
    /// empty directories are appended last. A name that is both a value and
    /// a prefix lists as a directory.
    ///
    /// An empty result is fine for the root or an existing empty directory.
    /// For any other path it means the directory does not exist.
    pub fn read_dir(&self, path: &FsPath) -> FsResult<Vec<DirEntry>> {
        if let Some(name) = path.file_name()
            && (!self.is_visible_name(name) || !self.is_addressable(path))
        {
            return Err(FsError::not_found(path));
        }

        let codec = self.codec();
        let delimiter = codec.delimiter();
        let prefix = codec.child_prefix(path);
        let pattern = codec.pattern_for(path);
        let keys = self.store.keys(&pattern)?;
        trace!(path = %path, pattern = %pattern, matches = keys.len(), "scanned");


        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
        for key in &keys {
            let Some(remainder) = codec.strip_prefix(key, &prefix) else {
                debug!(key = %key, prefix = %prefix, "scan returned key outside prefix");
                continue;
            };
            let (first, kind) = match remainder.split_once(delimiter) {
                Some((first, _)) => (first, EntryKind::Directory),
                None => (remainder, EntryKind::File),
            };
            if first.is_empty() {
                continue;
            }
            let name = codec.key_to_segment(first);
            // `.` and `..` are synthesized by the protocol adapter.
            if !self.is_visible_name(&name) || !codec.is_valid_segment(&name) {
                continue;
            }
            children
                .entry(name)
                .and_modify(|existing| {
                    if kind == EntryKind::Directory {
                        *existing = EntryKind::Directory;
                    }
                })
                .or_insert(kind);
        }

        for name in self.registry.children(path) {
            children.insert(name, EntryKind::Directory);
        }

        // Nothing listable: fine for an existing empty directory (registered
        // elsewhere, or holding only hidden keys), otherwise an error.
        if children.is_empty() && !path.is_root() {
            self.require_dir(path)?;
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| DirEntry { name, kind })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::KeyspaceOptions;
    use crate::store::MemoryStore;

    fn fs_with(entries: &[(&str, &str)]) -> KeyspaceFs<MemoryStore> {
        let store = MemoryStore::with_entries(entries.iter().copied());
        KeyspaceFs::new(Arc::new(store), KeyspaceOptions::default())
    }

    #[test]
    fn test_root_listing_dedups_directories() {
        let fs = fs_with(&[("a:b", "1"), ("a:c", "2"), ("a:d:e", "3"), ("top", "4")]);
        let entries = fs.read_dir(&FsPath::root()).unwrap();
        assert_eq!(entries, vec![DirEntry::dir("a"), DirEntry::file("top")]);
    }

    #[test]
    fn test_nested_listing() {
        let fs = fs_with(&[("a:b", "1"), ("a:c", "2"), ("a:d:e", "3")]);
        let entries = fs.read_dir(&FsPath::new("a")).unwrap();
        assert_eq!(
            entries,
            vec![DirEntry::file("b"), DirEntry::file("c"), DirEntry::dir("d")]
        );
    }

    #[test]
    fn test_empty_root() {
        let fs = fs_with(&[]);
        assert!(fs.read_dir(&FsPath::root()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let fs = fs_with(&[("f", "x")]);
        assert!(matches!(
            fs.read_dir(&FsPath::new("nope")),
            Err(FsError::NotFound { .. })
        ));
        assert!(matches!(
            fs.read_dir(&FsPath::new("f")),
            Err(FsError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_value_and_prefix_lists_once_as_directory() {
        let fs = fs_with(&[("x", "v"), ("x:y", "w")]);
        assert_eq!(fs.read_dir(&FsPath::root()).unwrap(), vec![DirEntry::dir("x")]);
    }

    #[test]
    fn test_slash_in_key_shown_as_sentinel() {
        let fs = fs_with(&[("urls:a/b", "1")]);
        let entries = fs.read_dir(&FsPath::new("urls")).unwrap();
        assert_eq!(entries, vec![DirEntry::file("a\u{FFFF}b")]);
    }

    #[test]
    fn test_hidden_and_empty_segments_skipped() {
        let fs = fs_with(&[("d:.hidden", "1"), ("d:", "2"), ("d::x", "3"), ("d:ok", "4")]);
        let entries = fs.read_dir(&FsPath::new("d")).unwrap();
        assert_eq!(entries, vec![DirEntry::file("ok")]);
    }

    #[test]
    fn test_dot_segments_never_listed() {
        let store = MemoryStore::with_entries([("d:.", "1"), ("d:..:x", "2"), ("d:.rc", "3")]);
        let fs = KeyspaceFs::new(
            Arc::new(store),
            KeyspaceOptions::default().hide_dotfiles(false),
        );
        let entries = fs.read_dir(&FsPath::new("d")).unwrap();
        assert_eq!(entries, vec![DirEntry::file(".rc")]);
    }

    #[test]
    fn test_only_empty_segment_keys_is_not_a_directory() {
        let fs = fs_with(&[("d::x", "1")]);
        assert!(fs.read_dir(&FsPath::new("d")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_glob_metacharacters_in_directory_name() {
        let fs = fs_with(&[("a*:x", "1"), ("ab:y", "2")]);
        let entries = fs.read_dir(&FsPath::new("a*")).unwrap();
        assert_eq!(entries, vec![DirEntry::file("x")]);
    }
}
