use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use super::{KeyspaceFs, NodeKind};
use crate::config::RmdirPolicy;
use crate::error::{FsError, FsResult};
use crate::file::KeyFile;
use crate::path::FsPath;
use crate::store::KvStore;

impl<S: KvStore> KeyspaceFs<S> {
    /// Create (or truncate) the file at `path` and return a handle to it.
    ///
    /// The parent must be an existing directory and `path` must not be one.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn create(&self, path: &FsPath) -> FsResult<KeyFile<S>> {
        self.check_new_name(path)?;
        let parent = path.parent().ok_or(FsError::Root)?;
        self.require_dir(&parent)?;
        if self.resolve(path)? == NodeKind::Directory {
            return Err(FsError::IsADirectory {
                path: path.to_string(),
            });
        }

        let key = self.codec().path_to_key(path);
        self.store.set(&key, b"")?;
        debug!(key = %key, "created");
        Ok(self.handle(path, key))
    }

    /// Open the existing file at `path`.
    pub fn open(&self, path: &FsPath) -> FsResult<KeyFile<S>> {
        let name = path.file_name().ok_or_else(|| FsError::IsADirectory {
            path: path.to_string(),
        })?;
        if !self.is_visible_name(name) || !self.is_addressable(path) {
            return Err(FsError::not_found(path));
        }

        let key = self.codec().path_to_key(path);
        if self.store.exists(&key)? {
            trace!(path = %path, key = %key, "opened");
            return Ok(self.handle(path, key));
        }
        match self.resolve(path)? {
            NodeKind::Directory => Err(FsError::IsADirectory {
                path: path.to_string(),
            }),
            _ => Err(FsError::not_found(path)),
        }
    }

    /// Delete the file at `path`.
    ///
    /// Deleting a key that does not exist is `NotFound`, not a silent success.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn unlink(&self, path: &FsPath) -> FsResult<()> {
        let name = path.file_name().ok_or(FsError::Root)?;
        if !self.is_visible_name(name) || !self.is_addressable(path) {
            return Err(FsError::not_found(path));
        }

        let key = self.codec().path_to_key(path);
        if self.store.del(&key)? {
            debug!(key = %key, "unlinked");
            return Ok(());
        }
        match self.resolve(path)? {
            NodeKind::Directory => Err(FsError::IsADirectory {
                path: path.to_string(),
            }),
            _ => Err(FsError::not_found(path)),
        }
    }

    /// Create an empty directory at `path`.
    ///
    /// Remembered in the registry, or as a marker key when directories are
    /// persisted in the store.
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn mkdir(&self, path: &FsPath) -> FsResult<()> {
        if path.is_root() {
            return Err(FsError::AlreadyExists {
                path: path.to_string(),
            });
        }
        self.check_new_name(path)?;
        let parent = path.parent().ok_or(FsError::Root)?;
        self.require_dir(&parent)?;
        if self.resolve(path)? != NodeKind::Absent {
            return Err(FsError::AlreadyExists {
                path: path.to_string(),
            });
        }

        if self.uses_markers() {
            let marker = self.marker_key(path);
            self.store.set(&marker, b"")?;
            debug!(marker = %marker, "wrote directory marker");
        } else {
            self.registry.mark(path);
            debug!("registered empty directory");
        }
        Ok(())
    }

    /// Remove the directory at `path`.
    ///
    /// The subtree is always scanned first, so a registered directory that
    /// has since gained keys is handled by the configured [`RmdirPolicy`]:
    /// `Recursive` deletes every key beneath it, `RequireEmpty` refuses with
    /// `NotEmpty`. Deletion is key by key; a failure partway leaves the keys
    /// already deleted gone and reports [`FsError::PartialDelete`].
    #[instrument(level = "debug", skip(self), fields(path = %path))]
    pub fn rmdir(&self, path: &FsPath) -> FsResult<()> {
        let name = path.file_name().ok_or(FsError::Root)?;
        if !self.is_visible_name(name) || !self.is_addressable(path) {
            return Err(FsError::not_found(path));
        }

        let keys = self.store.keys(&self.codec().pattern_for(path))?;
        let registered = self.registry.contains(path);
        let registered_below = self.registry.has_descendants(path);

        if keys.is_empty() && !registered && !registered_below {
            let key = self.codec().path_to_key(path);
            return if self.store.exists(&key)? {
                Err(FsError::NotADirectory {
                    path: path.to_string(),
                })
            } else {
                Err(FsError::not_found(path))
            };
        }

        if self.options.rmdir_policy == RmdirPolicy::RequireEmpty {
            let own_marker = self.marker_key(path);
            let occupied = keys
                .iter()
                .any(|k| !(self.uses_markers() && *k == own_marker));
            if occupied || registered_below {
                return Err(FsError::NotEmpty {
                    path: path.to_string(),
                });
            }
        }

        let total = keys.len();
        for (deleted, key) in keys.iter().enumerate() {
            if let Err(source) = self.store.del(key) {
                warn!(key = %key, deleted, total, "directory removal failed partway");
                return Err(FsError::PartialDelete {
                    path: path.to_string(),
                    deleted,
                    total,
                    source,
                });
            }
        }

        let unregistered = self.registry.remove_subtree(path);
        debug!(keys = total, unregistered, "removed directory");
        Ok(())
    }

    /// Set the size of the file at `path`, truncating or zero-extending it.
    pub fn truncate(&self, path: &FsPath, size: u64) -> FsResult<()> {
        self.open(path)?.truncate(size)
    }

    fn handle(&self, path: &FsPath, key: String) -> KeyFile<S> {
        KeyFile::new(Arc::clone(&self.store), key, path.clone())
    }
}
