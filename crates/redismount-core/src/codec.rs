//! Bidirectional mapping between filesystem paths and flat store keys.
//!
//! A path's segments are joined with the key delimiter (default `:`) to form
//! a key, so `/users/42/name` becomes `users:42:name`. Store keys may contain
//! `/`, which can never appear in a filename, so a literal `/` inside a key
//! segment is shown to the consumer as [`SENTINEL`] (U+FFFF, a noncharacter no
//! keyboard produces) and mapped back on the way in.
//!
//! Escaping is applied per segment, after splitting and before joining, in
//! both directions. That gives the round-trip laws:
//!
//! - `key_to_path(path_to_key(p)) == p` for every path whose segments do not
//!   contain the delimiter (such names are rejected by the filesystem layer).
//! - `path_to_key(key_to_path(k)) == k` for every key with no empty segment
//!   and no literal sentinel.

use crate::error::{FsError, FsResult};
use crate::path::FsPath;

/// Default key delimiter.
pub const DEFAULT_DELIMITER: char = ':';

/// Stand-in shown in filenames for a literal `/` inside a key segment.
pub const SENTINEL: char = '\u{FFFF}';

/// The structural separator as seen by the filesystem consumer.
pub const PATH_SEPARATOR: char = '/';

/// Characters with special meaning in Redis glob patterns.
const GLOB_META: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Translates between [`FsPath`]s and store keys for one delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCodec {
    delimiter: char,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl KeyCodec {
    /// Creates a codec for the given delimiter.
    ///
    /// The delimiter may not be the path separator, the sentinel, a glob
    /// metacharacter, or a control character.
    pub fn new(delimiter: char) -> FsResult<Self> {
        if delimiter == PATH_SEPARATOR
            || delimiter == SENTINEL
            || GLOB_META.contains(&delimiter)
            || delimiter.is_control()
            || delimiter.is_whitespace()
        {
            return Err(FsError::InvalidDelimiter(delimiter));
        }
        Ok(Self { delimiter })
    }

    /// Parses a delimiter given as a string (e.g. from the command line).
    pub fn from_delimiter_str(s: &str) -> FsResult<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => Err(FsError::InvalidDelimiterString(s.to_string())),
        }
    }

    #[inline]
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Whether `name` can be stored as a single key segment.
    ///
    /// A name containing the delimiter would split into two segments on the
    /// way back and break the round trip.
    pub fn is_valid_segment(&self, name: &str) -> bool {
        !name.is_empty() && name != "." && name != ".." && !name.contains(self.delimiter)
    }

    /// Converts one filename into one key segment.
    pub fn segment_to_key(&self, name: &str) -> String {
        name.replace(SENTINEL, "/")
    }

    /// Converts one key segment into one filename.
    pub fn key_to_segment(&self, part: &str) -> String {
        part.replace(PATH_SEPARATOR, &SENTINEL.to_string())
    }

    /// Maps a path to its key. The root maps to the empty key.
    ///
    /// ```
    /// use redismount_core::codec::KeyCodec;
    /// use redismount_core::path::FsPath;
    ///
    /// let codec = KeyCodec::default();
    /// assert_eq!(codec.path_to_key(&FsPath::new("/users/42")), "users:42");
    /// ```
    pub fn path_to_key(&self, path: &FsPath) -> String {
        let mut key = String::with_capacity(path.as_str().len());
        for (i, segment) in path.components().enumerate() {
            if i > 0 {
                key.push(self.delimiter);
            }
            key.push_str(&self.segment_to_key(segment));
        }
        key
    }

    /// Maps a key back to a path. Empty segments (`a::b`) are dropped since no
    /// filename can be empty.
    ///
    /// ```
    /// use redismount_core::codec::KeyCodec;
    ///
    /// let codec = KeyCodec::default();
    /// assert_eq!(codec.key_to_path("cache:http://x").as_str(), "cache/http/\u{FFFF}\u{FFFF}x");
    /// ```
    pub fn key_to_path(&self, key: &str) -> FsPath {
        FsPath::from_segments(
            key.split(self.delimiter)
                .filter(|part| !part.is_empty())
                .map(|part| self.key_to_segment(part)),
        )
    }

    /// The literal prefix every descendant key of `path` starts with.
    ///
    /// Empty for the root, `key + delimiter` otherwise.
    pub fn child_prefix(&self, path: &FsPath) -> String {
        if path.is_root() {
            return String::new();
        }
        let mut prefix = self.path_to_key(path);
        prefix.push(self.delimiter);
        prefix
    }

    /// Glob pattern matching every key beneath `path`.
    ///
    /// The root scans `*`; any other path scans `key + delimiter + *`, with
    /// glob metacharacters in the literal part backslash-escaped so a segment
    /// like `a*` only scans its own subtree.
    ///
    /// ```
    /// use redismount_core::codec::KeyCodec;
    /// use redismount_core::path::FsPath;
    ///
    /// let codec = KeyCodec::default();
    /// assert_eq!(codec.pattern_for(&FsPath::root()), "*");
    /// assert_eq!(codec.pattern_for(&FsPath::new("a/b")), "a:b:*");
    /// assert_eq!(codec.pattern_for(&FsPath::new("a*")), "a\\*:*");
    /// ```
    pub fn pattern_for(&self, path: &FsPath) -> String {
        let mut pattern = escape_glob(&self.child_prefix(path));
        pattern.push('*');
        pattern
    }

    /// Splits a scanned key into the part below `prefix`.
    ///
    /// Returns `None` if the key does not start with the prefix (stores are
    /// trusted, but a misbehaving glob must not panic the enumerator).
    pub fn strip_prefix<'k>(&self, key: &'k str, prefix: &str) -> Option<&'k str> {
        key.strip_prefix(prefix)
    }
}

/// Backslash-escapes Redis glob metacharacters.
pub fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if GLOB_META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
