//! Open file and directory handles.
//!
//! File handles wrap a [`KeyFile`], which holds no content of its own: every
//! read and write goes straight to the store, so there is nothing to flush on
//! release. Directory handles hold the listing snapshot taken at `opendir`,
//! which keeps `readdir` offsets stable while other clients change the
//! keyspace.

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use redismount_core::KeyFile;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::attr::DirListingEntry;

/// Handle type for FUSE operations.
#[derive(Debug)]
pub enum FuseHandle<S> {
    File(KeyFile<S>),
    /// Listing snapshot, `.` and `..` included.
    Directory(Vec<DirListingEntry>),
}

impl<S> FuseHandle<S> {
    pub fn is_file(&self) -> bool {
        matches!(self, FuseHandle::File(_))
    }

    pub fn as_file(&self) -> Option<&KeyFile<S>> {
        match self {
            FuseHandle::File(f) => Some(f),
            FuseHandle::Directory(_) => None,
        }
    }

    pub fn as_listing(&self) -> Option<&[DirListingEntry]> {
        match self {
            FuseHandle::Directory(entries) => Some(entries),
            FuseHandle::File(_) => None,
        }
    }
}

/// Thread-safe table mapping 64-bit handle ids to open handles.
///
/// Callers clone what they need out of a [`Ref`] before talking to the store,
/// so no shard lock is held across a network round trip.
#[derive(Debug)]
pub struct FuseHandleTable<S> {
    handles: DashMap<u64, FuseHandle<S>>,
    next_id: AtomicU64,
}

impl<S> Default for FuseHandleTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FuseHandleTable<S> {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            // 0 is never handed out
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a handle and return its ID.
    pub fn insert(&self, handle: FuseHandle<S>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(id, handle);
        id
    }

    pub fn get(&self, id: u64) -> Option<Ref<'_, u64, FuseHandle<S>>> {
        self.handles.get(&id)
    }

    /// Clone the file behind a handle, if it is a file handle.
    pub fn file(&self, id: u64) -> Option<KeyFile<S>> {
        self.handles.get(&id).and_then(|h| h.as_file().cloned())
    }

    /// Remove a handle by ID and return it.
    pub fn remove(&self, id: u64) -> Option<FuseHandle<S>> {
        self.handles.remove(&id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
