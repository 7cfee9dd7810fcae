//! Mount configuration for the FUSE filesystem.
//!
//! The keyspace is shared with every other Redis client, so values can change
//! under the mount at any time. Defaults keep kernel caching short.

use std::time::Duration;

/// Default time-to-live for cached attributes.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Default time-to-live for negative (ENOENT) lookups.
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_millis(500);

/// Configuration options for the FUSE filesystem.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Time-to-live for cached file attributes, both in the kernel and in
    /// the in-process cache.
    ///
    /// Default: 1 second.
    pub attr_ttl: Duration,

    /// Time-to-live for negative cache entries (ENOENT).
    ///
    /// Default: 500ms.
    pub negative_ttl: Duration,

    /// Reject every mutating call with EROFS.
    pub read_only: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            attr_ttl: DEFAULT_ATTR_TTL,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            read_only: false,
        }
    }
}

impl MountConfig {
    /// Creates a configuration with custom TTL values.
    pub fn with_ttl(attr_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            attr_ttl,
            negative_ttl,
            ..Default::default()
        }
    }

    /// Sets the read-only flag.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Disables in-process caching entirely (TTLs of zero).
    ///
    /// Useful when other clients write to the keyspace heavily.
    pub fn uncached() -> Self {
        Self::with_ttl(Duration::ZERO, Duration::ZERO)
    }
}
