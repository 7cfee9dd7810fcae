use tracing::trace;

use super::KeyspaceFs;
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::store::KvStore;

/// What a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Absent,
    /// A key exists at the path; `size` is the value's length in bytes.
    File { size: u64 },
    Directory,
}

/// The kind of an existing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// Attributes of an existing node. Directories report size zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub kind: EntryKind,
    pub size: u64,
}

impl Attr {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

impl<S: KvStore> KeyspaceFs<S> {
    /// Decide whether `path` is a file, a directory, or absent.
    ///
    /// First match wins: the root; hidden or unaddressable names (absent);
    /// a registered empty directory, or one with a registered directory
    /// somewhere beneath it; any key beneath the path (directory);
    /// a key at the path (file). A path with both a value and descendants is
    /// a directory.
    pub fn resolve(&self, path: &FsPath) -> FsResult<NodeKind> {
        let Some((parent, name)) = path.split() else {
            return Ok(NodeKind::Directory);
        };
        if !self.is_visible_name(name) || !self.is_addressable(path) {
            trace!(path = %path, "hidden or unaddressable name");
            return Ok(NodeKind::Absent);
        }
        if self.registry.is_marked(&parent, name) || self.registry.has_descendants(path) {
            return Ok(NodeKind::Directory);
        }

        // A key such as `d::x` has an empty segment after the prefix and
        // could never be listed, so it does not make `d` a directory.
        let codec = self.codec();
        let prefix = codec.child_prefix(path);
        let has_child = self.store.keys(&codec.pattern_for(path))?.iter().any(|key| {
            codec
                .strip_prefix(key, &prefix)
                .is_some_and(|rest| !rest.is_empty() && !rest.starts_with(codec.delimiter()))
        });
        if has_child {
            return Ok(NodeKind::Directory);
        }

        let key = codec.path_to_key(path);
        match self.store.get(&key)? {
            Some(value) => Ok(NodeKind::File {
                size: value.len() as u64,
            }),
            None => {
                trace!(path = %path, key = %key, "not found");
                Ok(NodeKind::Absent)
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but absence is a `NotFound` error.
    pub fn get_attr(&self, path: &FsPath) -> FsResult<Attr> {
        match self.resolve(path)? {
            NodeKind::Absent => Err(FsError::not_found(path)),
            NodeKind::File { size } => Ok(Attr {
                kind: EntryKind::File,
                size,
            }),
            NodeKind::Directory => Ok(Attr {
                kind: EntryKind::Directory,
                size: 0,
            }),
        }
    }

    /// Require `path` to be an existing directory.
    pub(crate) fn require_dir(&self, path: &FsPath) -> FsResult<()> {
        match self.resolve(path)? {
            NodeKind::Directory => Ok(()),
            NodeKind::File { .. } => Err(FsError::NotADirectory {
                path: path.to_string(),
            }),
            NodeKind::Absent => Err(FsError::not_found(path)),
        }
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
    fn test_root_is_directory() {
        let fs = fs_with(&[]);
        assert_eq!(fs.resolve(&FsPath::root()).unwrap(), NodeKind::Directory);
    }

    #[test]
    fn test_file_and_inferred_directory() {
        let fs = fs_with(&[("users:42:name", "ada")]);
        assert_eq!(fs.resolve(&FsPath::new("users")).unwrap(), NodeKind::Directory);
        assert_eq!(fs.resolve(&FsPath::new("users/42")).unwrap(), NodeKind::Directory);
        assert_eq!(
            fs.resolve(&FsPath::new("users/42/name")).unwrap(),
            NodeKind::File { size: 3 }
        );
        assert_eq!(fs.resolve(&FsPath::new("users/7")).unwrap(), NodeKind::Absent);
    }

    #[test]
    fn test_directory_shadows_value() {
        let fs = fs_with(&[("a", "v"), ("a:b", "w")]);
        assert_eq!(fs.resolve(&FsPath::new("a")).unwrap(), NodeKind::Directory);
    }

    #[test]
    fn test_empty_segment_keys_do_not_make_a_directory() {
        let fs = fs_with(&[("d::x", "1"), ("e:", "2")]);
        assert_eq!(fs.resolve(&FsPath::new("d")).unwrap(), NodeKind::Absent);
        assert_eq!(fs.resolve(&FsPath::new("e")).unwrap(), NodeKind::Absent);
    }

    #[test]
    fn test_hidden_names_absent() {
        let fs = fs_with(&[(".secret", "x")]);
        assert_eq!(fs.resolve(&FsPath::new(".secret")).unwrap(), NodeKind::Absent);

        let shown = KeyspaceFs::new(
            Arc::clone(fs.store()),
            KeyspaceOptions::default().hide_dotfiles(false),
        );
        assert_eq!(
            shown.resolve(&FsPath::new(".secret")).unwrap(),
            NodeKind::File { size: 1 }
        );
    }

    #[test]
    fn test_name_with_delimiter_is_absent() {
        let fs = fs_with(&[("a:b", "x")]);
        assert_eq!(fs.resolve(&FsPath::new("a:b")).unwrap(), NodeKind::Absent);
    }

    #[test]
    fn test_get_attr() {
        let fs = fs_with(&[("k", "four")]);
        let attr = fs.get_attr(&FsPath::new("k")).unwrap();
        assert_eq!(attr.kind, EntryKind::File);
        assert_eq!(attr.size, 4);
        assert!(fs.get_attr(&FsPath::root()).unwrap().is_dir());
        assert!(fs.get_attr(&FsPath::new("missing")).unwrap_err().is_not_found());
    }
}
