//! Connection and keyspace configuration.
//!
//! [`StoreConfig`] describes how to reach the server; [`KeyspaceOptions`]
//! controls how the flat keyspace is presented as a tree.

use std::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::codec::{DEFAULT_DELIMITER, KeyCodec};
use crate::error::FsResult;

/// Default TCP dial timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-command read/write timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Key name written under a directory's prefix when directories are
/// persisted as marker keys.
pub const DIR_MARKER: &str = ".redis-mount-folder";

/// How the store enumerates keys matching a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScan {
    /// A single `KEYS pattern` call.
    #[default]
    Keys,
    /// A `SCAN cursor MATCH pattern COUNT n` loop; does not block the server
    /// on large keyspaces.
    Cursor { count: usize },
}

/// Connection settings for [`RedisStore`](crate::store::RedisStore).
#[derive(Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    /// Logical database index (`SELECT`).
    pub db: i64,
    /// Sent with `AUTH` when present.
    pub password: Option<Zeroizing<String>>,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub key_scan: KeyScan,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            key_scan: KeyScan::Keys,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("key_scan", &self.key_scan)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    #[must_use]
    pub fn with_key_scan(mut self, key_scan: KeyScan) -> Self {
        self.key_scan = key_scan;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
    }

    /// `host:port`, for messages and the mount's fsname.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What `rmdir` does with a directory that still has keys beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RmdirPolicy {
    /// Delete every key in the subtree.
    #[default]
    Recursive,
    /// Refuse with `NotEmpty` unless nothing lives beneath the directory.
    RequireEmpty,
}

/// Where empty directories are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirPersistence {
    /// In-memory registry; empty directories vanish on remount.
    #[default]
    Memory,
    /// A hidden [`DIR_MARKER`] key under the directory's prefix.
    MarkerKey,
}

/// Presentation options for the keyspace tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyspaceOptions {
    pub codec: KeyCodec,
    /// Treat names starting with `.` as absent and omit them from listings.
    pub hide_dotfiles: bool,
    pub rmdir_policy: RmdirPolicy,
    pub dir_persistence: DirPersistence,
}

impl Default for KeyspaceOptions {
    fn default() -> Self {
        Self {
            codec: KeyCodec::default(),
            hide_dotfiles: true,
            rmdir_policy: RmdirPolicy::default(),
            dir_persistence: DirPersistence::default(),
        }
    }
}

impl KeyspaceOptions {
    /// Options with a custom key delimiter.
    ///
    /// ```
    /// use redismount_core::config::KeyspaceOptions;
    ///
    /// assert_eq!(KeyspaceOptions::with_delimiter('.').unwrap().delimiter(), '.');
    /// assert!(KeyspaceOptions::with_delimiter('/').is_err());
    /// ```
    pub fn with_delimiter(delimiter: char) -> FsResult<Self> {
        Ok(Self {
            codec: KeyCodec::new(delimiter)?,
            ..Default::default()
        })
    }

    pub fn delimiter(&self) -> char {
        self.codec.delimiter()
    }

    #[must_use]
    pub fn hide_dotfiles(mut self, hide: bool) -> Self {
        self.hide_dotfiles = hide;
        self
    }

    #[must_use]
    pub fn rmdir_policy(mut self, policy: RmdirPolicy) -> Self {
        self.rmdir_policy = policy;
        self
    }

    #[must_use]
    pub fn dir_persistence(mut self, persistence: DirPersistence) -> Self {
        self.dir_persistence = persistence;
        self
    }
}
