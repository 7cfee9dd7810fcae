//! Inode management for the FUSE filesystem.
//!
//! FUSE addresses nodes by inode number; the keyspace addresses them by
//! path. This table maps between the two and tracks kernel lookup counts so
//! entries can be evicted on `forget()`.

use dashmap::DashMap;
use redismount_core::path::FsPath;
use std::sync::atomic::{AtomicU64, Ordering};

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// Represents the kind of inode entry.
///
/// The kind of a path can change under the mount (a file becomes a directory
/// once another client writes a key beneath it), so lookups refresh it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Root,
    Directory,
    File,
}

impl InodeKind {
    pub fn is_dir(self) -> bool {
        matches!(self, InodeKind::Root | InodeKind::Directory)
    }
}

/// An entry in the inode table.
#[derive(Debug)]
pub struct InodeEntry {
    /// Path within the mounted keyspace.
    pub path: FsPath,
    pub kind: InodeKind,
    /// Lookup count for proper `forget()` handling.
    nlookup: AtomicU64,
}

impl InodeEntry {
    fn new(path: FsPath, kind: InodeKind, nlookup: u64) -> Self {
        Self {
            path,
            kind,
            nlookup: AtomicU64::new(nlookup),
        }
    }

    /// Increments the lookup count and returns the new value.
    pub fn inc_nlookup(&self) -> u64 {
        self.nlookup.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrements the lookup count by the given amount and returns the new
    /// value, saturating at zero.
    pub fn dec_nlookup(&self, count: u64) -> u64 {
        let mut current = self.nlookup.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(count);
            match self.nlookup.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn nlookup(&self) -> u64 {
        self.nlookup.load(Ordering::SeqCst)
    }
}

/// Thread-safe bidirectional mapping between inodes and keyspace paths.
pub struct InodeTable {
    path_to_inode: DashMap<FsPath, u64>,
    inode_to_entry: DashMap<u64, InodeEntry>,
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Creates a new inode table with the root directory pre-allocated.
    pub fn new() -> Self {
        let table = Self {
            path_to_inode: DashMap::new(),
            inode_to_entry: DashMap::new(),
            // Start at 2 since inode 1 is reserved for root
            next_inode: AtomicU64::new(2),
        };
        table.path_to_inode.insert(FsPath::root(), ROOT_INODE);
        table
            .inode_to_entry
            .insert(ROOT_INODE, InodeEntry::new(FsPath::root(), InodeKind::Root, 1));
        table
    }

    /// Records a kernel lookup of `path`: allocates an inode if needed,
    /// refreshes its kind, and increments its lookup count.
    pub fn lookup(&self, path: FsPath, kind: InodeKind) -> u64 {
        self.get_or_insert(path, kind, true)
    }

    /// Returns the inode for `path`, allocating one without touching the
    /// lookup count. Used for `readdir`, which the kernel does not count.
    pub fn get_or_allocate(&self, path: FsPath, kind: InodeKind) -> u64 {
        self.get_or_insert(path, kind, false)
    }

    fn get_or_insert(&self, path: FsPath, kind: InodeKind, counted: bool) -> u64 {
        if path.is_root() {
            return ROOT_INODE;
        }
        // Entry API avoids a TOCTOU race between two lookups of one path.
        let ino = *self.path_to_inode.entry(path.clone()).or_insert_with(|| {
            let ino = self.next_inode.fetch_add(1, Ordering::SeqCst);
            self.inode_to_entry
                .insert(ino, InodeEntry::new(path, kind, 0));
            ino
        });
        if let Some(mut entry) = self.inode_to_entry.get_mut(&ino) {
            entry.kind = kind;
            if counted {
                entry.inc_nlookup();
            }
        }
        ino
    }

    pub fn get(&self, inode: u64) -> Option<dashmap::mapref::one::Ref<'_, u64, InodeEntry>> {
        self.inode_to_entry.get(&inode)
    }

    /// Path and kind of an inode, cloned out of the table.
    pub fn resolve(&self, inode: u64) -> Option<(FsPath, InodeKind)> {
        self.inode_to_entry
            .get(&inode)
            .map(|entry| (entry.path.clone(), entry.kind))
    }

    pub fn get_inode(&self, path: &FsPath) -> Option<u64> {
        self.path_to_inode.get(path).map(|r| *r)
    }

    /// Decrements the lookup count for an inode, evicting it at zero.
    /// Returns `true` if the inode was evicted.
    pub fn forget(&self, inode: u64, nlookup: u64) -> bool {
        if inode == ROOT_INODE {
            return false;
        }
        let remaining = match self.inode_to_entry.get(&inode) {
            Some(entry) => entry.dec_nlookup(nlookup),
            None => return false,
        };
        remaining == 0 && self.evict(inode)
    }

    fn evict(&self, inode: u64) -> bool {
        let Some((_, entry)) = self.inode_to_entry.remove(&inode) else {
            return false;
        };
        // Only drop the path mapping if it still points at this inode; the
        // path may have been recreated with a fresh inode since.
        self.path_to_inode
            .remove_if(&entry.path, |_, mapped| *mapped == inode);
        true
    }

    /// Forgets the path mapping after a delete. The inode entry itself stays
    /// until the kernel calls `forget()`.
    pub fn invalidate_path(&self, path: &FsPath) -> Option<u64> {
        self.path_to_inode.remove(path).map(|(_, ino)| ino)
    }

    /// Forgets the mapping of `path` and everything beneath it. Returns the
    /// affected inodes.
    pub fn invalidate_subtree(&self, path: &FsPath) -> Vec<u64> {
        let mut removed = Vec::new();
        self.path_to_inode.retain(|p, ino| {
            if !p.is_root() && p.starts_with(path) {
                removed.push(*ino);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.inode_to_entry.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.inode_to_entry.len() <= 1
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
