//! Attribute caching for the FUSE filesystem.
//!
//! Every `getattr` on an uncached inode costs at least one round trip to
//! Redis (a scan plus a GET for files), so recent results are kept for a
//! short TTL. Lookups that came back ENOENT are cached separately, keyed by
//! parent inode and name.

use dashmap::DashMap;
use fuser::{FileAttr, FileType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Expired entries are swept once per this many negative inserts, so a
/// stream of lookups for distinct missing names cannot grow the cache
/// without bound.
const NEGATIVE_SWEEP_INTERVAL: u64 = 1024;

/// A cached file attribute with expiration time.
#[derive(Debug, Clone)]
pub struct CachedAttr {
    pub attr: FileAttr,
    expires: Instant,
}

impl CachedAttr {
    pub fn new(attr: FileAttr, ttl: Duration) -> Self {
        Self {
            attr,
            expires: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }

    /// Returns the remaining time until expiration.
    pub fn time_remaining(&self) -> Duration {
        self.expires.saturating_duration_since(Instant::now())
    }
}

/// Positive attributes by inode, and ENOENT lookups by (parent, name).
pub struct AttrCache {
    entries: DashMap<u64, CachedAttr>,
    negative: DashMap<(u64, String), Instant>,
    negative_inserts: AtomicU64,
    attr_ttl: Duration,
    negative_ttl: Duration,
}

impl AttrCache {
    pub fn new(attr_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            negative: DashMap::new(),
            negative_inserts: AtomicU64::new(0),
            attr_ttl,
            negative_ttl,
        }
    }

    /// Gets a cached attribute if it exists and hasn't expired.
    pub fn get(&self, inode: u64) -> Option<CachedAttr> {
        if let Some(entry) = self.entries.get(&inode) {
            if !entry.is_expired() {
                return Some(entry.clone());
            }
            drop(entry);
            self.entries.remove(&inode);
        }
        None
    }

    /// Inserts or updates a cached attribute. A zero TTL disables caching.
    pub fn insert(&self, inode: u64, attr: FileAttr) {
        if self.attr_ttl.is_zero() {
            return;
        }
        self.entries
            .insert(inode, CachedAttr::new(attr, self.attr_ttl));
    }

    pub fn invalidate(&self, inode: u64) {
        self.entries.remove(&inode);
    }

    /// Whether `name` under `parent` recently looked up as ENOENT.
    pub fn is_negative(&self, parent: u64, name: &str) -> bool {
        let key = (parent, name.to_string());
        if let Some(expires) = self.negative.get(&key) {
            if Instant::now() < *expires {
                return true;
            }
            drop(expires);
            self.negative.remove(&key);
        }
        false
    }

    pub fn insert_negative(&self, parent: u64, name: String) {
        if self.negative_ttl.is_zero() {
            return;
        }
        let inserted = self.negative_inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserted.is_multiple_of(NEGATIVE_SWEEP_INTERVAL) {
            self.cleanup_expired();
        }
        self.negative
            .insert((parent, name), Instant::now() + self.negative_ttl);
    }

    /// Drops every negative entry under `parent`, after something was
    /// created or removed there.
    pub fn invalidate_parent_negative(&self, parent: u64) {
        self.negative.retain(|k, _| k.0 != parent);
    }

    fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, v| !v.is_expired());
        self.negative.retain(|_, expires| now < *expires);
    }
}

/// One entry of a directory listing snapshot, as handed to `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListingEntry {
    pub inode: u64,
    pub file_type: FileType,
    pub name: String,
}

impl DirListingEntry {
    pub fn new(inode: u64, file_type: FileType, name: impl Into<String>) -> Self {
        Self {
            inode,
            file_type,
            name: name.into(),
        }
    }
}
