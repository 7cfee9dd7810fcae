//! Type-safe hierarchical paths as seen by the filesystem consumer.
//!
//! [`FsPath`] is the user-facing side of the keyspace mapping. It always uses
//! `/` as the structural separator regardless of the host OS, and the mount
//! root is the empty path. The store-facing side is a flat key produced by
//! [`KeyCodec`](crate::codec::KeyCodec).

use relative_path::{RelativePath, RelativePathBuf};
use std::fmt;

/// A path inside the mounted keyspace.
///
/// # Examples
///
/// ```
/// use redismount_core::path::FsPath;
///
/// let path = FsPath::new("/users/42/name");
/// assert_eq!(path.file_name(), Some("name"));
/// assert_eq!(path.parent().unwrap().as_str(), "users/42");
///
/// // Leading slashes are stripped
/// assert_eq!(path, FsPath::new("users/42/name"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FsPath(RelativePathBuf);

impl FsPath {
    /// The mount root (empty path).
    #[inline]
    pub fn root() -> Self {
        FsPath(RelativePathBuf::new())
    }

    /// Create a path from a string, stripping leading and trailing slashes.
    pub fn new(path: impl AsRef<str>) -> Self {
        let s = path.as_ref().trim_matches('/');
        FsPath(RelativePathBuf::from(s))
    }

    /// Build a path from already-split segments.
    ///
    /// Segments are taken verbatim; a segment that itself contains `/` is the
    /// caller's problem (see [`KeyCodec::key_to_path`](crate::codec::KeyCodec::key_to_path),
    /// which never produces one).
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut buf = RelativePathBuf::new();
        for segment in segments {
            buf.push(segment.as_ref());
        }
        FsPath(buf)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_str().is_empty()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[inline]
    pub fn as_relative_path(&self) -> &RelativePath {
        &self.0
    }

    /// Join this path with a single child segment.
    ///
    /// ```
    /// use redismount_core::path::FsPath;
    ///
    /// let dir = FsPath::new("sessions");
    /// assert_eq!(dir.join("abc").as_str(), "sessions/abc");
    /// assert_eq!(FsPath::root().join("top").as_str(), "top");
    /// ```
    pub fn join(&self, component: impl AsRef<str>) -> Self {
        FsPath(self.0.join(component.as_ref()))
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<FsPath> {
        if self.is_root() {
            return None;
        }
        self.0.parent().map(|p| FsPath(p.to_relative_path_buf()))
    }

    /// Final segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Iterate over the segments of this path.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.components().map(|c| c.as_str())
    }

    /// Number of segments (0 for the root).
    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Split into parent path and final segment.
    ///
    /// ```
    /// use redismount_core::path::FsPath;
    ///
    /// let path = FsPath::new("a/b/c");
    /// let (parent, name) = path.split().unwrap();
    /// assert_eq!(parent.as_str(), "a/b");
    /// assert_eq!(name, "c");
    /// assert!(FsPath::root().split().is_none());
    /// ```
    pub fn split(&self) -> Option<(FsPath, &str)> {
        let parent = self.parent()?;
        let name = self.file_name()?;
        Some((parent, name))
    }

    /// True when `self` is `ancestor` or lies somewhere beneath it.
    pub fn starts_with(&self, ancestor: &FsPath) -> bool {
        if ancestor.is_root() {
            return true;
        }
        self.0.starts_with(&ancestor.0)
    }

    /// True when the final segment follows the dotfile convention.
    pub fn is_hidden(&self) -> bool {
        self.file_name().is_some_and(|name| name.starts_with('.'))
    }
}

impl AsRef<str> for FsPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for FsPath {
    fn from(s: &str) -> Self {
        FsPath::new(s)
    }
}

impl From<String> for FsPath {
    fn from(s: String) -> Self {
        FsPath::new(s)
    }
}
