//! FUSE filesystem for Redis keyspaces.
//!
//! This crate mounts a Redis database as a directory tree: each key is a
//! file, and the delimiter-separated segments of its name are the
//! directories leading to it. Path translation and directory inference live
//! in `redismount-core`; this crate speaks the FUSE protocol on top of it.
//!
//! # Features
//!
//! - Read/write files backed by string values
//! - Directories inferred from key prefixes, plus empty directories
//! - Attribute and negative-lookup caching with short TTLs
//! - Read-only mounts
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use redismount_core::{KeyspaceFs, KeyspaceOptions, RedisStore, StoreConfig};
//! use redismount_fuse::{FuseBackend, MountConfig, RedisMountFs};
//!
//! let store = RedisStore::connect(&StoreConfig::default())?;
//! let fs = RedisMountFs::new(
//!     KeyspaceFs::new(Arc::new(store), KeyspaceOptions::default()),
//!     MountConfig::default(),
//! );
//! let handle = FuseBackend::new().mount(fs, "redis:localhost:6379/0", mountpoint, false)?;
//! ```

pub mod attr;
pub mod backend;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod handles;
pub mod inode;

pub use attr::{AttrCache, CachedAttr, DirListingEntry};
pub use backend::{FuseBackend, FuseMountHandle};
pub use config::MountConfig;
pub use error::{FuseError, FuseResult, ToErrno};
pub use filesystem::RedisMountFs;
pub use handles::{FuseHandle, FuseHandleTable};
pub use inode::{InodeEntry, InodeKind, InodeTable, ROOT_INODE};
