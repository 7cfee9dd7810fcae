//! Test mount harness for FUSE integration tests.
//!
//! Provides `TestMount`, which mounts a keyspace backed by an in-memory store
//! on a temporary directory and unmounts it on drop. The store stays
//! reachable so tests can check which keys a filesystem call produced, or
//! change keys behind the mount's back.

// Not all tests use all TestMount methods
#![allow(dead_code)]

use redismount_core::{KeyspaceFs, KeyspaceOptions, KvStore, MemoryStore};
use redismount_fuse::{FuseBackend, FuseMountHandle, MountConfig, RedisMountFs};
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// How long to wait for mount to become ready.
const MOUNT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait between mount readiness checks.
const MOUNT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// A mounted keyspace for testing.
///
/// # Example
///
/// ```ignore
/// use common::TestMount;
///
/// #[test]
/// fn test_write_read() {
///     let mount = TestMount::new().unwrap();
///     mount.write("test.txt", b"hello").unwrap();
///     assert_eq!(mount.key("test.txt").unwrap(), b"hello");
/// }
/// ```
pub struct TestMount {
    /// Field order matters: the mount must go before its directory.
    _handle: FuseMountHandle,
    pub mount_path: PathBuf,
    pub store: Arc<MemoryStore>,
    _temp_mount: TempDir,
}

impl TestMount {
    /// Mount an empty keyspace with default options.
    pub fn new() -> Result<Self, String> {
        Self::with_entries(std::iter::empty::<(&str, &str)>())
    }

    /// Mount a keyspace pre-populated with `entries`.
    pub fn with_entries<I, K, V>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self::with_options(
            MemoryStore::with_entries(entries),
            KeyspaceOptions::default(),
            false,
        )
    }

    /// Mount `store` with custom keyspace options.
    ///
    /// Caching is disabled so that keys changed directly in the store are
    /// visible through the mount straight away.
    pub fn with_options(
        store: MemoryStore,
        options: KeyspaceOptions,
        read_only: bool,
    ) -> Result<Self, String> {
        let store = Arc::new(store);
        let temp_mount = TempDir::new().map_err(|e| format!("Failed to create temp dir: {e}"))?;
        let mount_path = temp_mount.path().join("mnt");
        fs::create_dir(&mount_path).map_err(|e| format!("Failed to create mount point: {e}"))?;

        let fs = RedisMountFs::new(
            KeyspaceFs::new(Arc::clone(&store), options),
            MountConfig::uncached().read_only(read_only),
        );

        let handle = FuseBackend::with_timeouts(MOUNT_READY_TIMEOUT, MOUNT_CHECK_INTERVAL)
            .mount(fs, "redis-mount-test", &mount_path, read_only)
            .map_err(|e| format!("Failed to mount: {e}"))?;

        Ok(Self {
            _handle: handle,
            mount_path,
            store,
            _temp_mount: temp_mount,
        })
    }

    // =========================================================================
    // Store access
    // =========================================================================

    /// Raw value of a key, bypassing the mount.
    pub fn key(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get(key).expect("memory store never fails")
    }

    /// Every key in the store, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.store.all_keys()
    }

    // =========================================================================
    // Filesystem convenience methods
    // =========================================================================

    /// Build a full path from a relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.mount_path.join(relative.trim_start_matches('/'))
    }

    pub fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        File::open(self.path(path))?.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Write content to a file (creates or overwrites).
    pub fn write(&self, path: &str, content: &[u8]) -> io::Result<()> {
        let mut file = File::create(self.path(path))?;
        file.write_all(content)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn append(&self, path: &str, content: &[u8]) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path(path))?;
        file.write_all(content)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn mkdir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(self.path(path))
    }

    pub fn mkdir_all(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.path(path))
    }

    pub fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.path(path))
    }

    pub fn rmdir(&self, path: &str) -> io::Result<()> {
        fs::remove_dir(self.path(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path(path).exists()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.path(path).is_dir()
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.path(path).is_file()
    }

    pub fn metadata(&self, path: &str) -> io::Result<Metadata> {
        fs::metadata(self.path(path))
    }

    /// List directory entries (names only).
    pub fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let entries = fs::read_dir(self.path(path))?;
        let names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        Ok(names)
    }

    /// Truncate a file to a specific size.
    pub fn truncate(&self, path: &str, size: u64) -> io::Result<()> {
        let file = fs::OpenOptions::new().write(true).open(self.path(path))?;
        file.set_len(size)?;
        Ok(())
    }
}

/// Check if FUSE is available on this system.
pub fn fuse_available() -> bool {
    FuseBackend::new().is_available()
}

/// Skip test if FUSE is not available.
#[macro_export]
macro_rules! skip_if_no_fuse {
    () => {
        if !$crate::common::harness::fuse_available() {
            eprintln!("Skipping test: FUSE not available on this system");
            return;
        }
    };
}

/// Skip test if mounting fails (common in CI environments).
#[macro_export]
macro_rules! require_mount {
    ($mount_result:expr) => {
        match $mount_result {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Skipping test: {}", e);
                return;
            }
        }
    };
}
