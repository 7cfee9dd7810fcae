use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{KvStore, glob_match};
use crate::error::StoreResult;

/// A process-local store with the same observable behavior as Redis for the
/// primitives the filesystem uses.
///
/// # Example
///
/// ```
/// use redismount_core::store::{KvStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set("a:b", b"hello").unwrap();
/// assert_eq!(store.keys("a:*").unwrap(), vec!["a:b".to_string()]);
/// assert!(store.del("a:b").unwrap());
/// assert!(!store.del("a:b").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from `(key, value)` pairs.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of every key, sorted.
    pub fn all_keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }
}
