//! Key-value store abstraction.
//!
//! The keyspace filesystem only needs five primitives from its backing store.
//! [`KvStore`] names them; [`RedisStore`] talks to a real server and
//! [`MemoryStore`] keeps everything in a process-local map for tests and
//! offline mounts.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::sync::Arc;

use crate::error::StoreResult;

/// The store primitives consumed by the keyspace filesystem.
///
/// Implementations must be safe to call from many threads at once. A store
/// whose transport is not thread-safe serializes calls internally.
pub trait KvStore: Send + Sync {
    /// Fetch the value at `key`, or `None` if the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` at `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Delete `key`. Returns `true` if a key was actually removed.
    fn del(&self, key: &str) -> StoreResult<bool>;

    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// All keys matching a Redis glob pattern, in no particular order.
    ///
    /// Keys that are not valid UTF-8 cannot be named by a path and are
    /// skipped, so they never appear in listings or directory inference.
    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        (**self).del(key)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key)
    }

    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        (**self).keys(pattern)
    }
}

/// Match `key` against a Redis glob pattern.
///
/// Supports `*`, `?`, bracket classes with `^` negation and `a-z` ranges, and
/// backslash escapes, with the same semantics as the server's `KEYS` command.
///
/// ```
/// use redismount_core::store::glob_match;
///
/// assert!(glob_match("users:*", "users:42:name"));
/// assert!(glob_match("h?llo", "hallo"));
/// assert!(glob_match("h[^e]llo", "hallo"));
/// assert!(!glob_match("a\\*:*", "ab:c"));
/// ```
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    match_from(&pattern, &key)
}

fn match_from(mut pattern: &[char], mut key: &[char]) -> bool {
    while let Some(&p) = pattern.first() {
        match p {
            '*' => {
                while pattern.len() > 1 && pattern[1] == '*' {
                    pattern = &pattern[1..];
                }
                if pattern.len() == 1 {
                    return true;
                }
                for start in 0..=key.len() {
                    if match_from(&pattern[1..], &key[start..]) {
                        return true;
                    }
                }
                return false;
            }
            '?' => {
                if key.is_empty() {
                    return false;
                }
                key = &key[1..];
            }
            '[' => {
                let Some(&c) = key.first() else {
                    return false;
                };
                let (matched, rest) = match_class(&pattern[1..], c);
                if !matched {
                    return false;
                }
                pattern = rest;
                key = &key[1..];
                continue;
            }
            '\\' if pattern.len() >= 2 => {
                pattern = &pattern[1..];
                if key.first() != Some(&pattern[0]) {
                    return false;
                }
                key = &key[1..];
            }
            literal => {
                if key.first() != Some(&literal) {
                    return false;
                }
                key = &key[1..];
            }
        }
        pattern = &pattern[1..];
    }
    key.is_empty()
}

/// Evaluate a bracket class starting just after `[`.
///
/// Returns whether `c` matched and the pattern remaining after the closing
/// `]`. An unterminated class runs to the end of the pattern, as in Redis.
fn match_class(mut pattern: &[char], c: char) -> (bool, &[char]) {
    let negate = pattern.first() == Some(&'^');
    if negate {
        pattern = &pattern[1..];
    }
    let mut matched = false;
    loop {
        match pattern {
            [] => break,
            [']', rest @ ..] => {
                pattern = rest;
                break;
            }
            ['\\', escaped, rest @ ..] => {
                if *escaped == c {
                    matched = true;
                }
                pattern = rest;
            }
            [lo, '-', hi, rest @ ..] if *hi != ']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                if (lo..=hi).contains(&c) {
                    matched = true;
                }
                pattern = rest;
            }
            [single, rest @ ..] => {
                if *single == c {
                    matched = true;
                }
                pattern = rest;
            }
        }
    }
    (matched != negate, pattern)
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn test_star() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything:at:all"));
        assert!(glob_match("a:*", "a:"));
        assert!(glob_match("a:*", "a:b:c"));
        assert!(!glob_match("a:*", "a"));
        assert!(!glob_match("a:*", "ab:c"));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a**c", "ac"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("?", "x"));
        assert!(!glob_match("?", ""));
        assert!(!glob_match("?", "xy"));
    }

    #[test]
    fn test_classes() {
        assert!(glob_match("[abc]", "b"));
        assert!(!glob_match("[abc]", "d"));
        assert!(glob_match("[^abc]", "d"));
        assert!(!glob_match("[^abc]", "a"));
        assert!(glob_match("[a-c]x", "bx"));
        assert!(glob_match("[c-a]x", "bx"));
        assert!(!glob_match("[a-c]x", "dx"));
        assert!(glob_match("[\\]]", "]"));
    }

    #[test]
    fn test_escapes_are_literal() {
        assert!(glob_match("a\\*", "a*"));
        assert!(!glob_match("a\\*", "ab"));
        assert!(glob_match("\\[x\\]:*", "[x]:y"));
        assert!(!glob_match("\\[x\\]:*", "x:y"));
        assert!(glob_match("a\\?:*", "a?:k"));
    }

    #[test]
    fn test_non_ascii() {
        assert!(glob_match("caf?", "café"));
        assert!(glob_match("urls:*", "urls:https://x"));
    }
}
