//! Hierarchical filesystem semantics over a flat Redis keyspace.
//!
//! Keys such as `users:42:name` are presented as the path `/users/42/name`.
//! Directories are inferred from key prefixes; empty ones are kept alive by
//! an in-memory registry or by hidden marker keys.

pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod fs;
pub mod path;
pub mod registry;
pub mod store;

pub use codec::KeyCodec;
pub use config::{DirPersistence, KeyScan, KeyspaceOptions, RmdirPolicy, StoreConfig};
pub use error::{ErrorCategory, FsError, FsResult, StoreError};
pub use file::{KeyFile, MAX_VALUE_SIZE};
pub use fs::{Attr, DirEntry, EntryKind, KeyspaceFs, NodeKind};
pub use path::FsPath;
pub use store::{KvStore, MemoryStore, RedisStore};
