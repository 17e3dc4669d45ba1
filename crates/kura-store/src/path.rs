//! Logical path parsing.
//!
//! Logical paths are `/`-separated and always relative to the storage root.
//! The last segment names the target; everything before it names the chain of
//! ancestor directories.

use crate::error::{StorageError, StorageResult};

/// The storage root's logical path.
pub const ROOT: &str = "/";

/// A parsed logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalPath<'a> {
    /// The storage root itself.
    Root,
    /// A named entry under a chain of ancestor directories.
    Child {
        parents: Vec<&'a str>,
        name: &'a str,
    },
}

impl<'a> LogicalPath<'a> {
    /// Split a logical path into its ancestor chain and target name.
    ///
    /// Rejects paths that don't start with `/`, paths containing NUL, and
    /// target names that are empty, `.` or `..`. Ancestor segments are not
    /// otherwise validated here; a segment the index doesn't hold simply fails
    /// to resolve.
    pub fn parse(path: &'a str) -> StorageResult<Self> {
        if path == ROOT {
            return Ok(LogicalPath::Root);
        }
        if path.contains('\0') {
            return Err(StorageError::bad_path(path.replace('\0', "\\0")));
        }

        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| StorageError::bad_path(path))?;

        let mut segments: Vec<&str> = rest.split('/').collect();
        let name = segments.pop().unwrap_or_default();
        if matches!(name, "" | "." | "..") {
            return Err(StorageError::bad_path(path));
        }

        Ok(LogicalPath::Child {
            parents: segments,
            name,
        })
    }

    /// The target's own name, `None` for the root.
    pub fn name(&self) -> Option<&'a str> {
        match self {
            LogicalPath::Root => None,
            LogicalPath::Child { name, .. } => Some(name),
        }
    }
}

/// Join a directory's logical path and an entry name.
///
/// `join("/", "a")` is `/a`, not `//a`.
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
