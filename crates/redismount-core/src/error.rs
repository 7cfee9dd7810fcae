//! Error types for the keyspace filesystem.
//!
//! [`StoreError`] covers failures talking to the backing store (dial, auth,
//! command). [`FsError`] is what filesystem operations return; it wraps store
//! failures and adds the outcomes the hierarchy layer synthesizes itself
//! (not found, not empty, type mismatches). [`ErrorCategory`] classifies an
//! `FsError` so protocol adapters can pick their own error code.

use thiserror::Error;

/// Failures of the key-value store connection.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not establish the TCP connection.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: redis::RedisError,
    },

    /// The server rejected the configured password.
    #[error("Authentication failed: {source}")]
    Auth {
        #[source]
        source: redis::RedisError,
    },

    /// Selecting the logical database failed.
    #[error("Failed to select database {db}: {source}")]
    Select {
        db: i64,
        #[source]
        source: redis::RedisError,
    },

    /// A command failed for a reason other than the key being absent.
    #[error("{command} {key} failed: {source}")]
    Command {
        command: &'static str,
        key: String,
        #[source]
        source: redis::RedisError,
    },
}

impl StoreError {
    /// Convenience constructor for command failures.
    pub fn command(command: &'static str, key: impl Into<String>, source: redis::RedisError) -> Self {
        StoreError::Command {
            command,
            key: key.into(),
            source,
        }
    }

    /// True for dial and auth failures, which are fatal at startup.
    pub fn is_connection_error(&self) -> bool {
        match self {
            StoreError::Connect { .. } | StoreError::Auth { .. } | StoreError::Select { .. } => true,
            StoreError::Command { source, .. } => {
                source.is_connection_dropped() || source.is_connection_refusal()
            }
        }
    }
}

/// Errors returned by filesystem operations over the keyspace.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    #[error("Expected directory but found file: '{path}'")]
    NotADirectory { path: String },

    #[error("Expected file but found directory: '{path}'")]
    IsADirectory { path: String },

    #[error("Directory not empty: '{path}'")]
    NotEmpty { path: String },

    #[error("Path already exists: '{path}'")]
    AlreadyExists { path: String },

    /// Name cannot be represented as a single key segment.
    #[error("Invalid name '{name}': empty, reserved, or contains the key delimiter")]
    InvalidName { name: String },

    #[error("Invalid key delimiter {0:?}")]
    InvalidDelimiter(char),

    #[error("Key delimiter must be exactly one character, got {0:?}")]
    InvalidDelimiterString(String),

    /// A write or truncate would grow the value past the store's size limit.
    #[error("'{path}' would grow to {size} bytes, over the {limit}-byte value limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    /// The root directory cannot be created, removed, or opened as a file.
    #[error("Operation not permitted on the mount root")]
    Root,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A multi-key directory removal failed partway. Keys already deleted
    /// stay deleted.
    #[error("Removing '{path}' failed after deleting {deleted} of {total} keys: {source}")]
    PartialDelete {
        path: String,
        deleted: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
}

impl FsError {
    pub fn not_found(path: impl ToString) -> Self {
        FsError::NotFound {
            path: path.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from(self)
    }

    /// True for the normal "no such file" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Result type for store primitives.
pub type StoreResult<T> = Result<T, StoreError>;

/// Semantic classification of an [`FsError`].
///
/// # Example
///
/// ```
/// use redismount_core::error::{ErrorCategory, FsError};
///
/// let err = FsError::not_found("/missing");
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    AlreadyExists,
    NotEmpty,
    IsDirectory,
    NotDirectory,
    InvalidArgument,
    PermissionDenied,
    /// Value would exceed the store's size limit.
    TooLarge,
    /// Transport or store failure.
    IoError,
}

impl ErrorCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::NotEmpty => "NotEmpty",
            Self::IsDirectory => "IsDirectory",
            Self::NotDirectory => "NotDirectory",
            Self::InvalidArgument => "InvalidArgument",
            Self::PermissionDenied => "PermissionDenied",
            Self::TooLarge => "TooLarge",
            Self::IoError => "IoError",
        }
    }
}

impl From<&FsError> for ErrorCategory {
    fn from(e: &FsError) -> Self {
        match e {
            FsError::NotFound { .. } => Self::NotFound,
            FsError::NotADirectory { .. } => Self::NotDirectory,
            FsError::IsADirectory { .. } => Self::IsDirectory,
            FsError::NotEmpty { .. } => Self::NotEmpty,
            FsError::AlreadyExists { .. } => Self::AlreadyExists,
            FsError::InvalidName { .. }
            | FsError::InvalidDelimiter(_)
            | FsError::InvalidDelimiterString(_) => Self::InvalidArgument,
            FsError::Root => Self::PermissionDenied,
            FsError::FileTooLarge { .. } => Self::TooLarge,
            FsError::Store(_) | FsError::PartialDelete { .. } => Self::IoError,
        }
    }
}
