//! Disk access seam.
//!
//! The engine performs every syscall through [`Disk`] so tests can substitute
//! a wrapper that fails on demand. [`LocalDisk`] is the real implementation.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Mode for newly created files.
pub const FILE_MODE: u32 = 0o644;

/// Mode for newly created directories.
pub const DIR_MODE: u32 = 0o755;

/// Disk operations used by the storage engine.
///
/// Paths are physical (already joined onto the storage root).
#[async_trait]
pub trait Disk: Send + Sync {
    /// Create a new file for reading and writing. Fails if it already exists.
    async fn create_file(&self, path: &Path) -> io::Result<File>;

    /// Create a single directory. Fails if it already exists.
    async fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Open an existing file for reading.
    async fn open(&self, path: &Path) -> io::Result<File>;

    /// Open an existing file for writing, truncated to zero length.
    async fn open_truncate(&self, path: &Path) -> io::Result<File>;

    /// Remove a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything in it.
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Stream all of `src` into `dest` and flush.
    ///
    /// Returns the number of bytes copied.
    async fn copy_stream(&self, src: &mut File, dest: &mut File) -> io::Result<u64> {
        let copied = tokio::io::copy(src, dest).await?;
        dest.flush().await?;
        Ok(copied)
    }
}

/// Local filesystem access via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDisk;

#[async_trait]
impl Disk for LocalDisk {
    async fn create_file(&self, path: &Path) -> io::Result<File> {
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(FILE_MODE)
            .open(path)
            .await
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::DirBuilderExt;

        std::fs::DirBuilder::new().mode(DIR_MODE).create(path)
    }

    async fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path).await
    }

    async fn open_truncate(&self, path: &Path) -> io::Result<File> {
        fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path).await
    }
}

#[cfg(any(test, feature = "test-mock"))]
pub use failing::{DiskOp, FailingDisk};

#[cfg(any(test, feature = "test-mock"))]
mod failing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// A [`Disk`] operation that can be made to fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum DiskOp {
        CreateFile,
        CreateDir,
        Open,
        OpenTruncate,
        RemoveFile,
        RemoveDirAll,
        CopyStream,
    }

    /// Wrapper around a [`Disk`] that fails selected operations.
    ///
    /// Failing operations return an I/O error without touching the inner disk.
    #[derive(Debug, Default)]
    pub struct FailingDisk<D: Disk = LocalDisk> {
        inner: D,
        failing: Mutex<HashSet<DiskOp>>,
    }

    impl<D: Disk> FailingDisk<D> {
        pub fn new(inner: D) -> Self {
            Self {
                inner,
                failing: Mutex::new(HashSet::new()),
            }
        }

        /// Make every future `op` fail until [`FailingDisk::clear`].
        pub fn fail_on(&self, op: DiskOp) {
            self.failing.lock().insert(op);
        }

        /// Stop failing anything.
        pub fn clear(&self) {
            self.failing.lock().clear();
        }

        fn check(&self, op: DiskOp) -> io::Result<()> {
            if self.failing.lock().contains(&op) {
                Err(io::Error::other(format!("injected failure: {op:?}")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl<D: Disk> Disk for FailingDisk<D> {
        async fn create_file(&self, path: &Path) -> io::Result<File> {
            self.check(DiskOp::CreateFile)?;
            self.inner.create_file(path).await
        }

        async fn create_dir(&self, path: &Path) -> io::Result<()> {
            self.check(DiskOp::CreateDir)?;
            self.inner.create_dir(path).await
        }

        async fn open(&self, path: &Path) -> io::Result<File> {
            self.check(DiskOp::Open)?;
            self.inner.open(path).await
        }

        async fn open_truncate(&self, path: &Path) -> io::Result<File> {
            self.check(DiskOp::OpenTruncate)?;
            self.inner.open_truncate(path).await
        }

        async fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.check(DiskOp::RemoveFile)?;
            self.inner.remove_file(path).await
        }

        async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
            self.check(DiskOp::RemoveDirAll)?;
            self.inner.remove_dir_all(path).await
        }

        async fn copy_stream(&self, src: &mut File, dest: &mut File) -> io::Result<u64> {
            self.check(DiskOp::CopyStream)?;
            self.inner.copy_stream(src, dest).await
        }
    }
}
