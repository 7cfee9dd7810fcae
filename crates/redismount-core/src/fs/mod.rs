//! Hierarchical filesystem semantics over a flat keyspace.
//!
//! [`KeyspaceFs`] is the layer protocol adapters talk to. Directories are
//! never stored: a path is a directory when some key lives beneath it or when
//! it was created empty and is remembered by the [`EmptyDirRegistry`] (or, in
//! marker-key mode, by a hidden marker key). Every method may be called from
//! many threads at once.
//!
//! ```
//! use std::sync::Arc;
//! use redismount_core::config::KeyspaceOptions;
//! use redismount_core::fs::{KeyspaceFs, NodeKind};
//! use redismount_core::path::FsPath;
//! use redismount_core::store::MemoryStore;
//!
//! let fs = KeyspaceFs::new(Arc::new(MemoryStore::new()), KeyspaceOptions::default());
//! let file = fs.create(&FsPath::new("/a/b")).unwrap();
//! file.write(0, b"hello").unwrap();
//!
//! assert_eq!(fs.resolve(&FsPath::new("/a")).unwrap(), NodeKind::Directory);
//! assert_eq!(fs.resolve(&FsPath::new("/a/b")).unwrap(), NodeKind::File { size: 5 });
//! ```

mod listing;
mod mutate;
mod resolve;

pub use self::listing::DirEntry;
pub use self::resolve::{Attr, EntryKind, NodeKind};

use std::sync::Arc;

use crate::codec::KeyCodec;
use crate::config::{DIR_MARKER, DirPersistence, KeyspaceOptions};
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::registry::EmptyDirRegistry;
use crate::store::KvStore;

/// A keyspace mounted as a tree.
///
/// Owns the empty-directory registry, so empty directories live exactly as
/// long as this instance.
#[derive(Debug)]
pub struct KeyspaceFs<S> {
    store: Arc<S>,
    options: KeyspaceOptions,
    registry: EmptyDirRegistry,
}

impl<S: KvStore> KeyspaceFs<S> {
    pub fn new(store: Arc<S>, options: KeyspaceOptions) -> Self {
        Self {
            store,
            options,
            registry: EmptyDirRegistry::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &KeyspaceOptions {
        &self.options
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.options.codec
    }

    pub fn registry(&self) -> &EmptyDirRegistry {
        &self.registry
    }

    fn uses_markers(&self) -> bool {
        self.options.dir_persistence == DirPersistence::MarkerKey
    }

    /// Key of the marker that keeps `dir` alive in marker-key mode.
    pub fn marker_key(&self, dir: &FsPath) -> String {
        let mut key = self.codec().child_prefix(dir);
        key.push_str(DIR_MARKER);
        key
    }

    /// Whether a consumer may see a node with this final segment.
    pub(crate) fn is_visible_name(&self, name: &str) -> bool {
        if self.uses_markers() && name == DIR_MARKER {
            return false;
        }
        !(self.options.hide_dotfiles && name.starts_with('.'))
    }

    /// Whether every segment of `path` can be mapped to a key segment.
    fn is_addressable(&self, path: &FsPath) -> bool {
        path.components()
            .all(|segment| self.codec().is_valid_segment(segment))
    }

    /// Validate a path about to be created and return its final segment.
    fn check_new_name<'p>(&self, path: &'p FsPath) -> FsResult<&'p str> {
        let name = path.file_name().ok_or(FsError::Root)?;
        if !self.is_addressable(path) || !self.is_visible_name(name) {
            return Err(FsError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(name)
    }
}
