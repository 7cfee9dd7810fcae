//! Error handling and mapping for the FUSE filesystem.
//!
//! Keyspace errors are classified by [`ErrorCategory`] and turned into the
//! POSIX error codes FUSE hands back to the kernel.

use redismount_core::error::{ErrorCategory, FsError, StoreError};
use std::io;
use thiserror::Error;

/// FUSE-specific errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FuseError {
    /// Keyspace operation error (boxed to reduce enum size).
    #[error("Keyspace operation failed: {0}")]
    Fs(Box<FsError>),

    /// IO error (mounting, unmounting).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid inode: {0}")]
    InvalidInode(u64),

    #[error("Invalid file handle: {0}")]
    InvalidHandle(u64),

    /// Wrong handle type (e.g., tried to read from a directory handle).
    #[error("Wrong handle type for operation")]
    WrongHandleType,

    /// Name is not valid UTF-8.
    #[error("Name is not valid UTF-8")]
    InvalidName,

    #[error("Invalid offset: {0}")]
    InvalidOffset(i64),

    #[error("Filesystem is mounted read-only")]
    ReadOnly,

    /// FUSE itself is missing on this host.
    #[error("FUSE is unavailable: {0}")]
    Unavailable(String),
}

impl FuseError {
    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            FuseError::Fs(e) => fs_error_to_errno(e),
            FuseError::Io(e) => io_error_to_errno(e),
            FuseError::InvalidInode(_) => libc::ENOENT,
            FuseError::InvalidHandle(_) | FuseError::WrongHandleType => libc::EBADF,
            FuseError::InvalidName | FuseError::InvalidOffset(_) => libc::EINVAL,
            FuseError::ReadOnly => libc::EROFS,
            FuseError::Unavailable(_) => libc::ENODEV,
        }
    }

    /// True for the ordinary "no such entry" outcome, which is not worth
    /// logging above trace.
    pub fn is_not_found(&self) -> bool {
        self.to_errno() == libc::ENOENT
    }
}

impl From<FsError> for FuseError {
    fn from(e: FsError) -> Self {
        FuseError::Fs(Box::new(e))
    }
}

impl From<StoreError> for FuseError {
    fn from(e: StoreError) -> Self {
        FuseError::Fs(Box::new(FsError::Store(e)))
    }
}

/// Maps an error category to an errno.
pub fn category_to_errno(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::NotFound => libc::ENOENT,
        ErrorCategory::AlreadyExists => libc::EEXIST,
        ErrorCategory::NotEmpty => libc::ENOTEMPTY,
        ErrorCategory::IsDirectory => libc::EISDIR,
        ErrorCategory::NotDirectory => libc::ENOTDIR,
        ErrorCategory::InvalidArgument => libc::EINVAL,
        ErrorCategory::PermissionDenied => libc::EPERM,
        ErrorCategory::TooLarge => libc::EFBIG,
        ErrorCategory::IoError => libc::EIO,
    }
}

/// Converts a keyspace error to a libc error code.
pub fn fs_error_to_errno(e: &FsError) -> i32 {
    category_to_errno(e.category())
}

/// Converts an IO error to a libc error code, defaulting to EIO.
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Result type for FUSE operations.
pub type FuseResult<T> = Result<T, FuseError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        fs_error_to_errno(self)
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_mapping() {
        let cases = [
            (FsError::not_found("/a"), libc::ENOENT),
            (FsError::NotEmpty { path: "/d".into() }, libc::ENOTEMPTY),
            (FsError::IsADirectory { path: "/d".into() }, libc::EISDIR),
            (FsError::NotADirectory { path: "/f".into() }, libc::ENOTDIR),
            (FsError::AlreadyExists { path: "/d".into() }, libc::EEXIST),
            (FsError::InvalidName { name: "a:b".into() }, libc::EINVAL),
            (FsError::Root, libc::EPERM),
            (
                FsError::FileTooLarge {
                    path: "/f".into(),
                    size: 1 << 40,
                    limit: 1 << 29,
                },
                libc::EFBIG,
            ),
        ];
        for (err, errno) in cases {
            assert_eq!(err.to_errno(), errno, "{err}");
            assert_eq!(FuseError::from(err).to_errno(), errno);
        }
    }

    #[test]
    fn test_fuse_specific_errors() {
        assert_eq!(FuseError::InvalidInode(7).to_errno(), libc::ENOENT);
        assert!(FuseError::InvalidInode(7).is_not_found());
        assert_eq!(FuseError::InvalidHandle(3).to_errno(), libc::EBADF);
        assert_eq!(FuseError::WrongHandleType.to_errno(), libc::EBADF);
        assert_eq!(FuseError::ReadOnly.to_errno(), libc::EROFS);
        assert_eq!(FuseError::InvalidName.to_errno(), libc::EINVAL);
        assert_eq!(FuseError::InvalidOffset(-1).to_errno(), libc::EINVAL);
    }

    #[test]
    fn test_io_error_mapping() {
        let e = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(io_error_to_errno(&e), libc::EACCES);

        // Should return EIO when no raw OS error
        let e = io::Error::other("custom error");
        assert_eq!(io_error_to_errno(&e), libc::EIO);
    }
}
