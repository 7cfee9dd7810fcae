//! Mounting and unmounting.
//!
//! Spawns the filesystem on a fuser background session and hands back a
//! handle that unmounts when dropped.

use crate::error::{FuseError, FuseResult};
use crate::filesystem::RedisMountFs;
use fuser::{BackgroundSession, MountOption};
use redismount_core::KvStore;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Filesystem subtype shown in the mount table (`fuse.redis-mount`).
pub const SUBTYPE: &str = "redis-mount";

/// Handle to a mounted keyspace.
///
/// Wraps the fuser `BackgroundSession`. Dropping this handle triggers unmount.
pub struct FuseMountHandle {
    session: Option<BackgroundSession>,
    mountpoint: PathBuf,
}

impl FuseMountHandle {
    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// Unmount and wait for the session thread to finish.
    pub fn unmount(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(mountpoint = %self.mountpoint.display(), "unmounting");

            // Force unmount first so busy handles cannot block the join
            self.force_unmount();
            std::thread::sleep(Duration::from_millis(100));

            session.join();
            info!(mountpoint = %self.mountpoint.display(), "unmounted");
        }
    }

    /// Force unmount the filesystem using system tools.
    /// This is a fallback when the normal unmount is blocked.
    fn force_unmount(&self) {
        #[cfg(target_os = "macos")]
        {
            let result = std::process::Command::new("diskutil")
                .args(["unmount", "force"])
                .arg(&self.mountpoint)
                .output();

            match result {
                Ok(output) if output.status.success() => {
                    debug!("Force unmount via diskutil succeeded");
                    return;
                }
                _ => {
                    debug!("diskutil unmount failed, trying umount");
                }
            }

            let _ = std::process::Command::new("umount")
                .arg("-f")
                .arg(&self.mountpoint)
                .output();
        }

        #[cfg(target_os = "linux")]
        {
            // Lazy unmount
            let _ = std::process::Command::new("fusermount")
                .args(["-uz"])
                .arg(&self.mountpoint)
                .output();
        }
    }
}

impl Drop for FuseMountHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// FUSE mounting backend.
#[derive(Debug, Clone, Copy)]
pub struct FuseBackend {
    /// Timeout for waiting for mount readiness
    pub mount_timeout: Duration,
    /// Polling interval when waiting for mount
    pub poll_interval: Duration,
}

impl Default for FuseBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FuseBackend {
    pub fn new() -> Self {
        Self {
            mount_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_timeouts(mount_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            mount_timeout,
            poll_interval,
        }
    }

    pub fn is_available(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            Path::new("/Library/Filesystems/macfuse.fs").exists()
        }
        #[cfg(target_os = "linux")]
        {
            Path::new("/dev/fuse").exists()
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            false
        }
    }

    pub fn unavailable_reason(&self) -> Option<String> {
        if self.is_available() {
            return None;
        }

        #[cfg(target_os = "macos")]
        {
            Some("macFUSE is not installed. Download it from https://osxfuse.github.io/".to_string())
        }
        #[cfg(target_os = "linux")]
        {
            Some("FUSE is not available. Ensure the fuse kernel module is loaded.".to_string())
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            Some("FUSE is not supported on this platform.".to_string())
        }
    }

    /// Mount options for a session. `source` names the keyspace in the mount
    /// table, e.g. `redis:localhost:6379/0`.
    pub fn mount_options(source: &str, read_only: bool) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(source.to_string()),
            MountOption::Subtype(SUBTYPE.to_string()),
            MountOption::AutoUnmount,
            if read_only {
                MountOption::RO
            } else {
                MountOption::RW
            },
        ];

        // On macOS, set the volume name shown in Finder
        #[cfg(target_os = "macos")]
        {
            options.push(MountOption::CUSTOM(format!("volname={source}")));
        }

        options
    }

    /// Mount `fs` at `mountpoint` and wait until the kernel serves it.
    pub fn mount<S: KvStore + 'static>(
        &self,
        fs: RedisMountFs<S>,
        source: &str,
        mountpoint: &Path,
        read_only: bool,
    ) -> FuseResult<FuseMountHandle> {
        if !self.is_available() {
            return Err(FuseError::Unavailable(
                self.unavailable_reason().unwrap_or_default(),
            ));
        }

        let options = Self::mount_options(source, read_only);
        let session = fuser::spawn_mount2(fs, mountpoint, &options)?;
        let handle = FuseMountHandle {
            session: Some(session),
            mountpoint: mountpoint.to_path_buf(),
        };

        // On timeout the handle drops here and tears the session down.
        self.wait_for_mount(mountpoint)?;
        info!(source, mountpoint = %mountpoint.display(), "mounted");
        Ok(handle)
    }

    /// Wait for the mount to become ready by polling until we can read the directory.
    fn wait_for_mount(&self, mountpoint: &Path) -> FuseResult<()> {
        let deadline = Instant::now() + self.mount_timeout;

        while Instant::now() < deadline {
            // ENOENT or permission errors during mount setup are expected
            if let Ok(mut entries) = std::fs::read_dir(mountpoint) {
                let _ = entries.next();
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }

        Err(FuseError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!(
                "FUSE mount did not become ready within {:?}",
                self.mount_timeout
            ),
        )))
    }
}
