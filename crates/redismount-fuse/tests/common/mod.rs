//! Common test infrastructure for FUSE integration tests.
//!
//! Provides the `TestMount` harness and assertions for testing the
//! filesystem through actual kernel mounts.

// Not every test file uses every helper
#![allow(dead_code)]

pub mod harness;

pub use harness::TestMount;

// Macros (skip_if_no_fuse!, require_mount!) are #[macro_export] so they're
// available at the crate root. No need to re-export them here.

/// Assert that a file has exactly the expected content.
#[track_caller]
pub fn assert_file_content(mount: &TestMount, path: &str, expected: &[u8]) {
    let actual = mount
        .read(path)
        .unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
    assert_eq!(actual, expected, "content mismatch for {path}");
}

/// Assert that a file reports the expected size.
#[track_caller]
pub fn assert_file_size(mount: &TestMount, path: &str, expected: u64) {
    let meta = mount
        .metadata(path)
        .unwrap_or_else(|e| panic!("failed to stat {path}: {e}"));
    assert_eq!(meta.len(), expected, "size mismatch for {path}");
}

/// Assert that a directory lists exactly `expected`, in any order.
#[track_caller]
pub fn assert_dir_entries(mount: &TestMount, path: &str, expected: &[&str]) {
    let mut actual = mount
        .list(path)
        .unwrap_or_else(|e| panic!("failed to list {path}: {e}"));
    actual.sort();
    let mut expected: Vec<String> = expected.iter().map(|s| (*s).to_string()).collect();
    expected.sort();
    assert_eq!(actual, expected, "listing mismatch for {path}");
}

/// Assert that an IO result failed with the given errno.
#[track_caller]
pub fn assert_errno<T: std::fmt::Debug>(result: std::io::Result<T>, errno: i32) {
    match result {
        Ok(v) => panic!("expected errno {errno}, got Ok({v:?})"),
        Err(e) => assert_eq!(e.raw_os_error(), Some(errno), "unexpected error: {e}"),
    }
}
