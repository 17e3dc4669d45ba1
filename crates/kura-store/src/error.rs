//! Storage error types.

use std::io;
use thiserror::Error;

/// Coarse classification of a [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable: bad, missing, duplicate or wrong-type path.
    Path,
    /// Environment failure: disk I/O, permissions, out of space.
    System,
}

/// Storage error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Path is malformed or its parent chain does not resolve to a directory.
    #[error("bad path: {0}")]
    BadPath(String),

    /// No entry at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entry with this name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The storage root is never deleted.
    #[error("cannot delete root")]
    CannotDeleteRoot,

    /// Disk operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The copy half of a move landed at `dest`, but removing `src` failed.
    ///
    /// Both entries now exist. Retrying the delete of `src` completes the move.
    #[error("moved {src} to {dest} but could not delete the source: {source}")]
    MoveIncomplete {
        src: String,
        dest: String,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Create a BadPath error.
    pub fn bad_path(path: impl Into<String>) -> Self {
        Self::BadPath(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Wrap a disk failure with what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Path or System.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::BadPath(_)
            | StorageError::NotFound(_)
            | StorageError::AlreadyExists(_)
            | StorageError::NotAFile(_)
            | StorageError::NotADirectory(_)
            | StorageError::CannotDeleteRoot => ErrorKind::Path,
            StorageError::Io { .. } | StorageError::MoveIncomplete { .. } => ErrorKind::System,
        }
    }
}

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;
