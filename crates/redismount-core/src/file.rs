//! A single key's value presented as a random-access byte file.
//!
//! The store offers no partial-value update, so every write fetches the whole
//! value, splices the new bytes in and stores the result back. Two concurrent
//! writers to the same key can therefore lose one another's update, even
//! within one process: the race is inherent to the store and no
//! in-process lock could prevent it across mounts.

use std::sync::Arc;

use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::store::KvStore;

/// Largest value the store accepts (Redis caps strings at 512 MiB).
pub const MAX_VALUE_SIZE: u64 = 512 * 1024 * 1024;

/// Open-file handle over one key.
///
/// Holds no cached content; each call goes to the store. A key deleted while
/// the handle is open reads as empty, and a later write recreates it.
#[derive(Debug)]
pub struct KeyFile<S> {
    store: Arc<S>,
    key: String,
    path: FsPath,
}

impl<S> Clone for KeyFile<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            path: self.path.clone(),
        }
    }
}

impl<S: KvStore> KeyFile<S> {
    pub(crate) fn new(store: Arc<S>, key: String, path: FsPath) -> Self {
        Self { store, key, path }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }

    fn value(&self) -> FsResult<Vec<u8>> {
        Ok(self.store.get(&self.key)?.unwrap_or_default())
    }

    /// Current size of the value in bytes.
    pub fn len(&self) -> FsResult<u64> {
        Ok(self.value()?.len() as u64)
    }

    pub fn is_empty(&self) -> FsResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read up to `len` bytes at `offset`, clipped to the value's length.
    ///
    /// Reading at or past the end yields an empty buffer, not an error.
    pub fn read(&self, offset: u64, len: usize) -> FsResult<Vec<u8>> {
        let value = self.value()?;
        let start = clamp_offset(offset, value.len());
        let end = start.saturating_add(len).min(value.len());
        trace!(key = %self.key, offset, len, returned = end - start, "read");
        Ok(value[start..end].to_vec())
    }

    /// Write `data` at `offset`, zero-filling any gap past the current end.
    ///
    /// Returns the number of bytes written, which is always `data.len()`. An
    /// empty write never touches the store. A write ending past
    /// [`MAX_VALUE_SIZE`] fails with `FileTooLarge` before anything is read.
    pub fn write(&self, offset: u64, data: &[u8]) -> FsResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let end = offset.checked_add(data.len() as u64).unwrap_or(u64::MAX);
        let end = self.check_size(end)?;
        let mut value = self.value()?;
        splice_at(&mut value, end - data.len(), data);
        self.store.set(&self.key, &value)?;
        trace!(key = %self.key, offset, len = data.len(), size = value.len(), "write");
        Ok(data.len())
    }

    /// Shrink or zero-extend the value to exactly `size` bytes.
    pub fn truncate(&self, size: u64) -> FsResult<()> {
        let size = self.check_size(size)?;
        let mut value = self.value()?;
        value.resize(size, 0);
        self.store.set(&self.key, &value)?;
        trace!(key = %self.key, size, "truncate");
        Ok(())
    }
}

impl<S> KeyFile<S> {
    fn check_size(&self, size: u64) -> FsResult<usize> {
        usize::try_from(size)
            .ok()
            .filter(|_| size <= MAX_VALUE_SIZE)
            .ok_or_else(|| FsError::FileTooLarge {
                path: self.path.to_string(),
                size,
                limit: MAX_VALUE_SIZE,
            })
    }
}

fn clamp_offset(offset: u64, len: usize) -> usize {
    usize::try_from(offset).map_or(len, |o| o.min(len))
}

/// Overwrite `value[offset..offset + data.len()]`, growing it as needed.
///
/// The caller has already bounded `offset + data.len()`.
fn splice_at(value: &mut Vec<u8>, offset: usize, data: &[u8]) {
    let end = offset + data.len();
    if value.len() < end {
        value.resize(end, 0);
    }
    value[offset..end].copy_from_slice(data);
}
