//! FUSE filesystem implementation over a Redis keyspace.
//!
//! This module implements the fuser `Filesystem` trait on top of
//! [`KeyspaceFs`]. Each kernel request is translated to a keyspace path,
//! handed to the keyspace layer, and the result is turned back into inode
//! attributes or an errno.

use crate::attr::{AttrCache, DirListingEntry};
use crate::config::MountConfig;
use crate::error::{FuseError, FuseResult};
use crate::handles::{FuseHandle, FuseHandleTable};
use crate::inode::{InodeKind, InodeTable, ROOT_INODE};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use redismount_core::{Attr, EntryKind, FsPath, KeyspaceFs, KvStore};
use std::ffi::OsStr;
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Block size reported in attributes and statfs.
const BLOCK_SIZE: u32 = 4096;

/// Default file permissions (rw-r--r--).
const DEFAULT_FILE_PERM: u16 = 0o644;

/// Default directory permissions (rwxr-xr-x).
const DEFAULT_DIR_PERM: u16 = 0o755;

/// Longest file name reported by statfs.
const MAX_NAME_LEN: u32 = 255;

/// FUSE filesystem serving a keyspace.
///
/// Holds no file content. Attributes are cached for `attr_ttl` and listings
/// live only as long as the directory handle that took them.
pub struct RedisMountFs<S> {
    fs: KeyspaceFs<S>,
    inodes: InodeTable,
    attr_cache: AttrCache,
    handles: FuseHandleTable<S>,
    config: MountConfig,
    uid: u32,
    gid: u32,
}

impl<S: KvStore> RedisMountFs<S> {
    pub fn new(fs: KeyspaceFs<S>, config: MountConfig) -> Self {
        // SAFETY: getuid/getgid are always successful and have no side effects.
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        info!(
            delimiter = %fs.options().delimiter(),
            read_only = config.read_only,
            uid,
            gid,
            "RedisMountFs initialized"
        );

        Self {
            fs,
            inodes: InodeTable::new(),
            attr_cache: AttrCache::new(config.attr_ttl, config.negative_ttl),
            handles: FuseHandleTable::new(),
            config,
            uid,
            gid,
        }
    }

    pub fn keyspace(&self) -> &KeyspaceFs<S> {
        &self.fs
    }

    fn make_attr(&self, ino: u64, attr: Attr) -> FileAttr {
        let now = SystemTime::now();
        let (kind, perm, nlink) = match attr.kind {
            EntryKind::Directory => (FileType::Directory, DEFAULT_DIR_PERM, 2),
            EntryKind::File => (FileType::RegularFile, DEFAULT_FILE_PERM, 1),
        };
        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn check_writable(&self) -> FuseResult<()> {
        if self.config.read_only {
            Err(FuseError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn path_of(&self, ino: u64) -> FuseResult<FsPath> {
        self.inodes
            .resolve(ino)
            .map(|(path, _)| path)
            .ok_or(FuseError::InvalidInode(ino))
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> FuseResult<FsPath> {
        let name = name.to_str().ok_or(FuseError::InvalidName)?;
        Ok(self.path_of(parent)?.join(name))
    }

    /// Fetch fresh attributes for `path` and cache them under `ino`.
    fn fetch_attr(&self, ino: u64, path: &FsPath) -> FuseResult<FileAttr> {
        let attr = self.make_attr(ino, self.fs.get_attr(path)?);
        self.attr_cache.insert(ino, attr);
        Ok(attr)
    }

    /// Drop cached state that a change to `path` (under `parent`) may have
    /// made stale. The parent is included because its existence can depend on
    /// its last child.
    fn invalidate(&self, parent: u64, path: &FsPath) {
        for ino in self.inodes.invalidate_subtree(path) {
            self.attr_cache.invalidate(ino);
        }
        self.attr_cache.invalidate(parent);
        self.attr_cache.invalidate_parent_negative(parent);
    }

    fn do_lookup(&self, parent: u64, name: &OsStr) -> FuseResult<FileAttr> {
        let path = self.child_path(parent, name)?;
        let attr = self.fs.get_attr(&path)?;
        let kind = match attr.kind {
            EntryKind::Directory => InodeKind::Directory,
            EntryKind::File => InodeKind::File,
        };
        let ino = self.inodes.lookup(path, kind);
        let file_attr = self.make_attr(ino, attr);
        self.attr_cache.insert(ino, file_attr);
        Ok(file_attr)
    }

    fn do_getattr(&self, ino: u64) -> FuseResult<FileAttr> {
        let path = self.path_of(ino)?;
        self.fetch_attr(ino, &path)
    }

    fn do_setattr(&self, ino: u64, size: Option<u64>, fh: Option<u64>) -> FuseResult<FileAttr> {
        let path = self.path_of(ino)?;
        if let Some(size) = size {
            self.check_writable()?;
            match fh.and_then(|fh| self.handles.file(fh)) {
                Some(file) => file.truncate(size)?,
                None => self.fs.truncate(&path, size)?,
            }
            self.attr_cache.invalidate(ino);
        }
        // Mode, ownership and timestamps are not stored; report current state.
        self.fetch_attr(ino, &path)
    }

    fn do_open(&self, ino: u64, flags: i32) -> FuseResult<u64> {
        let path = self.path_of(ino)?;
        let writing = flags & libc::O_ACCMODE != libc::O_RDONLY;
        if writing || flags & libc::O_TRUNC != 0 {
            self.check_writable()?;
        }
        let file = self.fs.open(&path)?;
        if flags & libc::O_TRUNC != 0 {
            file.truncate(0)?;
            self.attr_cache.invalidate(ino);
        }
        Ok(self.handles.insert(FuseHandle::File(file)))
    }

    fn do_read(&self, fh: u64, offset: i64, size: u32) -> FuseResult<Vec<u8>> {
        let file = self.handles.file(fh).ok_or(FuseError::InvalidHandle(fh))?;
        let offset = u64::try_from(offset).map_err(|_| FuseError::InvalidOffset(offset))?;
        Ok(file.read(offset, size as usize)?)
    }

    fn do_write(&self, ino: u64, fh: u64, offset: i64, data: &[u8]) -> FuseResult<u32> {
        self.check_writable()?;
        let file = self.handles.file(fh).ok_or(FuseError::InvalidHandle(fh))?;
        let offset = u64::try_from(offset).map_err(|_| FuseError::InvalidOffset(offset))?;
        let written = file.write(offset, data)?;
        self.attr_cache.invalidate(ino);
        // FUSE never hands us more than u32::MAX bytes at once
        Ok(u32::try_from(written).unwrap_or(u32::MAX))
    }

    fn do_opendir(&self, ino: u64) -> FuseResult<u64> {
        let path = self.path_of(ino)?;
        let parent_ino = path
            .parent()
            .and_then(|parent| self.inodes.get_inode(&parent))
            .unwrap_or(ROOT_INODE);

        let children = self.fs.read_dir(&path)?;
        let mut entries = Vec::with_capacity(children.len() + 2);
        entries.push(DirListingEntry::new(ino, FileType::Directory, "."));
        entries.push(DirListingEntry::new(parent_ino, FileType::Directory, ".."));
        for child in children {
            let (kind, file_type) = match child.kind {
                EntryKind::Directory => (InodeKind::Directory, FileType::Directory),
                EntryKind::File => (InodeKind::File, FileType::RegularFile),
            };
            let child_ino = self.inodes.get_or_allocate(path.join(&child.name), kind);
            entries.push(DirListingEntry::new(child_ino, file_type, child.name));
        }

        debug!(ino, path = %path, entries = entries.len() - 2, "opendir");
        Ok(self.handles.insert(FuseHandle::Directory(entries)))
    }

    fn do_create(&self, parent: u64, name: &OsStr) -> FuseResult<(FileAttr, u64)> {
        self.check_writable()?;
        let path = self.child_path(parent, name)?;
        let file = self.fs.create(&path)?;
        self.invalidate(parent, &path);

        let ino = self.inodes.lookup(path, InodeKind::File);
        let attr = self.make_attr(
            ino,
            Attr {
                kind: EntryKind::File,
                size: 0,
            },
        );
        self.attr_cache.insert(ino, attr);
        let fh = self.handles.insert(FuseHandle::File(file));
        Ok((attr, fh))
    }

    fn do_mkdir(&self, parent: u64, name: &OsStr) -> FuseResult<FileAttr> {
        self.check_writable()?;
        let path = self.child_path(parent, name)?;
        self.fs.mkdir(&path)?;
        self.invalidate(parent, &path);

        let ino = self.inodes.lookup(path, InodeKind::Directory);
        let attr = self.make_attr(
            ino,
            Attr {
                kind: EntryKind::Directory,
                size: 0,
            },
        );
        self.attr_cache.insert(ino, attr);
        Ok(attr)
    }

    fn do_unlink(&self, parent: u64, name: &OsStr) -> FuseResult<()> {
        self.check_writable()?;
        let path = self.child_path(parent, name)?;
        self.fs.unlink(&path)?;
        self.invalidate(parent, &path);
        Ok(())
    }

    fn do_rmdir(&self, parent: u64, name: &OsStr) -> FuseResult<()> {
        self.check_writable()?;
        let path = self.child_path(parent, name)?;
        let result = self.fs.rmdir(&path);
        // A partial delete still changed the tree.
        self.invalidate(parent, &path);
        result.map_err(FuseError::from)
    }
}

/// Log a failed request. ENOENT is the ordinary outcome of probing for a
/// name and stays at trace.
fn log_failure(op: &'static str, ino: u64, err: &FuseError) {
    if err.is_not_found() {
        trace!(op, ino, error = %err, "not found");
    } else {
        debug!(op, ino, error = %err, errno = err.to_errno(), "request failed");
    }
}

impl<S: KvStore + 'static> Filesystem for RedisMountFs<S> {
    fn init(&mut self, _req: &Request<'_>, config: &mut KernelConfig) -> Result<(), c_int> {
        info!("FUSE filesystem initialized");
        config.add_capabilities(fuser::consts::FUSE_ASYNC_READ).ok();
        Ok(())
    }

    fn destroy(&mut self) {
        info!(open_handles = self.handles.len(), "FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, name = ?name, "lookup");

        if let Some(name) = name.to_str()
            && self.attr_cache.is_negative(parent, name)
        {
            reply.error(libc::ENOENT);
            return;
        }

        match self.do_lookup(parent, name) {
            Ok(attr) => reply.entry(&self.config.attr_ttl, &attr, 0),
            Err(e) => {
                if e.is_not_found()
                    && let Some(name) = name.to_str()
                {
                    self.attr_cache.insert_negative(parent, name.to_string());
                }
                log_failure("lookup", parent, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(ino, nlookup, "forget");
        if self.inodes.forget(ino, nlookup) {
            self.attr_cache.invalidate(ino);
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(ino, "getattr");

        if let Some(cached) = self.attr_cache.get(ino) {
            reply.attr(&cached.time_remaining(), &cached.attr);
            return;
        }

        match self.do_getattr(ino) {
            Ok(attr) => reply.attr(&self.config.attr_ttl, &attr),
            Err(e) => {
                log_failure("getattr", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(ino, ?size, ?fh, "setattr");

        match self.do_setattr(ino, size, fh) {
            Ok(attr) => reply.attr(&self.config.attr_ttl, &attr),
            Err(e) => {
                log_failure("setattr", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(ino, flags, "open");

        match self.do_open(ino, flags) {
            // Sizes change behind the kernel's back; bypass the page cache.
            Ok(fh) => reply.opened(fh, fuser::consts::FOPEN_DIRECT_IO),
            Err(e) => {
                log_failure("open", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(ino, fh, offset, size, "read");

        match self.do_read(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                log_failure("read", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(ino, fh, offset, size = data.len(), "write");

        match self.do_write(ino, fh, offset, data) {
            Ok(written) => reply.written(written),
            Err(e) => {
                log_failure("write", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        trace!(ino, fh, "flush");
        // Writes go straight to the store, so there is nothing to flush.
        if self.handles.get(fh).is_some() {
            reply.ok();
        } else {
            reply.error(libc::EBADF);
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _datasync: bool, reply: ReplyEmpty) {
        trace!(ino, fh, "fsync");
        // Durability is up to the server's persistence settings.
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(ino, fh, "release");
        self.handles.remove(fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(ino, "opendir");

        match self.do_opendir(ino) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => {
                log_failure("opendir", ino, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(ino, fh, offset, "readdir");

        let Some(handle) = self.handles.get(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let Some(entries) = handle.as_listing() else {
            reply.error(libc::EBADF);
            return;
        };

        let start = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.iter().enumerate().skip(start) {
            // add() returns true once the reply buffer is full
            if reply.add(entry.inode, (i + 1) as i64, entry.file_type, &entry.name) {
                break;
            }
        }
        drop(handle);
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        trace!(ino, fh, "releasedir");
        self.handles.remove(fh);
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        // The store has no meaningful capacity; report a large, mostly free
        // volume so tools that check free space do not refuse to write.
        reply.statfs(
            1_000_000,       // blocks
            1_000_000,       // bfree
            1_000_000,       // bavail
            1_000_000,       // files
            1_000_000,       // ffree
            BLOCK_SIZE,      // bsize
            MAX_NAME_LEN,    // namelen
            BLOCK_SIZE,      // frsize
        );
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        trace!(parent, name = ?name, "create");

        match self.do_create(parent, name) {
            Ok((attr, fh)) => reply.created(
                &self.config.attr_ttl,
                &attr,
                0,
                fh,
                fuser::consts::FOPEN_DIRECT_IO,
            ),
            Err(e) => {
                log_failure("create", parent, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, name = ?name, "mkdir");

        match self.do_mkdir(parent, name) {
            Ok(attr) => reply.entry(&self.config.attr_ttl, &attr, 0),
            Err(e) => {
                log_failure("mkdir", parent, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent, name = ?name, "unlink");

        match self.do_unlink(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => {
                log_failure("unlink", parent, &e);
                reply.error(e.to_errno());
            }
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent, name = ?name, "rmdir");

        match self.do_rmdir(parent, name) {
            Ok(()) => reply.ok(),
            Err(e) => {
                log_failure("rmdir", parent, &e);
                reply.error(e.to_errno());
            }
        }
    }
}
