//! The storage engine.
//!
//! [`Storage`] owns the path index and serializes every operation behind one
//! exclusive lock. Callers take the lock with [`Storage::lock`] and run
//! operations on the returned [`StorageGuard`]; dropping the guard unlocks.
//! Each operation resolves against the index, performs the disk call, then
//! updates the index to match.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::disk::{Disk, LocalDisk};
use crate::error::{StorageError, StorageResult};
use crate::index::{Index, Node, NodeKind};
use crate::listing::{listing_order, ListEntry};
use crate::path::{self, LogicalPath};

/// Single-node file storage over a local directory.
#[derive(Debug)]
pub struct Storage<D: Disk = LocalDisk> {
    root: PathBuf,
    index: Mutex<Index>,
    disk: D,
}

impl Storage<LocalDisk> {
    /// Open (creating if needed) and index the storage root.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        Self::with_disk(root, LocalDisk).await
    }
}

impl<D: Disk> Storage<D> {
    /// Open the storage root, performing all later disk calls through `disk`.
    pub async fn with_disk(root: impl Into<PathBuf>, disk: D) -> StorageResult<Self> {
        let root: PathBuf = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::io(
                format!("can't create local storage dir {}", root.display()),
                e,
            )
        })?;

        let index = Index::scan(&root).map_err(|e| {
            StorageError::io(format!("can't scan storage dir {}", root.display()), e)
        })?;
        info!("indexed {} entries under {}", index.len(), root.display());

        Ok(Self {
            root,
            index: Mutex::new(index),
            disk,
        })
    }

    /// The physical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// Take the engine lock.
    ///
    /// Every storage operation, read or write, runs under this one lock.
    pub async fn lock(&self) -> StorageGuard<'_, D> {
        StorageGuard {
            index: self.index.lock().await,
            disk: &self.disk,
        }
    }

    /// Lock, list `path`, unlock.
    pub async fn list(&self, path: &str) -> StorageResult<Vec<ListEntry>> {
        self.lock().await.list(path)
    }

    /// Lock, open `path` for reading, unlock. The handle outlives the lock.
    pub async fn get_file(&self, path: &str) -> StorageResult<File> {
        self.lock().await.get_file(path).await
    }

    /// Lock, create a directory, unlock.
    pub async fn create_directory(&self, path: &str) -> StorageResult<()> {
        self.lock().await.create_directory(path).await
    }

    /// Lock, delete, unlock.
    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        self.lock().await.delete(path).await
    }

    /// Lock, copy `src` into the directory `dest`, unlock.
    pub async fn copy(&self, dest: &str, src: &str) -> StorageResult<String> {
        self.lock().await.copy(dest, src).await
    }

    /// Lock, move `src` into the directory `dest`, unlock.
    pub async fn move_item(&self, dest: &str, src: &str) -> StorageResult<String> {
        self.lock().await.move_item(dest, src).await
    }
}

/// Exclusive access to the storage engine.
pub struct StorageGuard<'a, D: Disk> {
    index: MutexGuard<'a, Index>,
    disk: &'a D,
}

impl<D: Disk> StorageGuard<'_, D> {
    /// Read-only view of the index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Create an empty file and return a writable handle to it.
    ///
    /// The caller writes the content and drops the handle.
    pub async fn create_file(&mut self, path: &str) -> StorageResult<File> {
        let target = LogicalPath::parse(path)?;
        let Some(name) = target.name() else {
            return Err(StorageError::already_exists(path));
        };

        let parent = self.index.parent_mut(path, &target)?;
        if parent.child(name).is_some() {
            return Err(StorageError::already_exists(path));
        }

        let physical = parent.physical().join(name);
        let file = self.disk.create_file(&physical).await.map_err(|e| {
            StorageError::io(format!("can't create file {}", physical.display()), e)
        })?;

        parent.insert_child(Node::file(name, physical));
        debug!(path, "created file");
        Ok(file)
    }

    /// Create an empty directory.
    pub async fn create_directory(&mut self, path: &str) -> StorageResult<()> {
        let target = LogicalPath::parse(path)?;
        let Some(name) = target.name() else {
            return Err(StorageError::already_exists(path));
        };

        let parent = self.index.parent_mut(path, &target)?;
        if parent.child(name).is_some() {
            return Err(StorageError::already_exists(path));
        }

        let physical = parent.physical().join(name);
        self.disk.create_dir(&physical).await.map_err(|e| {
            StorageError::io(format!("can't create directory {}", physical.display()), e)
        })?;

        parent.insert_child(Node::directory(name, physical));
        debug!(path, "created directory");
        Ok(())
    }

    /// Open an existing file for reading.
    pub async fn get_file(&self, path: &str) -> StorageResult<File> {
        let node = self.existing_file(path)?;
        self.disk.open(node.physical()).await.map_err(|e| {
            StorageError::io(format!("can't open file {}", node.physical().display()), e)
        })
    }

    /// Open an existing file truncated, for overwriting its content.
    pub async fn replace_file(&mut self, path: &str) -> StorageResult<File> {
        let node = self.existing_file(path)?;
        let file = self.disk.open_truncate(node.physical()).await.map_err(|e| {
            StorageError::io(
                format!("can't open file {} for writing", node.physical().display()),
                e,
            )
        })?;
        debug!(path, "truncated file for update");
        Ok(file)
    }

    fn existing_file(&self, path: &str) -> StorageResult<&Node> {
        let node = self.index.resolve_item(path)?;
        if node.kind().is_file() {
            Ok(node)
        } else {
            Err(StorageError::not_a_file(path))
        }
    }

    /// Delete a file, or a directory and everything under it.
    ///
    /// The index entry goes first. If the disk delete then fails, the parent
    /// directory is re-scanned so the index again matches what is on disk.
    pub async fn delete(&mut self, path: &str) -> StorageResult<()> {
        let target = LogicalPath::parse(path).map_err(|_| StorageError::not_found(path))?;
        let Some(name) = target.name() else {
            return Err(StorageError::CannotDeleteRoot);
        };

        let parent = self
            .index
            .parent_mut(path, &target)
            .map_err(|_| StorageError::not_found(path))?;
        let node = parent
            .remove_child(name)
            .ok_or_else(|| StorageError::not_found(path))?;

        let removed = match node.kind() {
            NodeKind::File => self.disk.remove_file(node.physical()).await,
            NodeKind::Directory => self.disk.remove_dir_all(node.physical()).await,
        };

        if let Err(e) = removed {
            match parent.rescan() {
                Ok(_) => debug!(path, "re-scanned parent after failed delete"),
                Err(scan) => warn!(
                    "re-scan of {} after failed delete also failed: {}",
                    parent.physical().display(),
                    scan
                ),
            }
            return Err(StorageError::io(
                format!("can't delete {}", node.physical().display()),
                e,
            ));
        }

        debug!(path, "deleted");
        Ok(())
    }

    /// Copy the file `src` into the directory `dest`, keeping its name.
    ///
    /// Returns the logical path of the copy. If streaming the content fails,
    /// the partial copy is removed before the error is returned.
    pub async fn copy(&mut self, dest: &str, src: &str) -> StorageResult<String> {
        let mut src_file = self.get_file(src).await?;
        let name = LogicalPath::parse(src)?
            .name()
            .ok_or_else(|| StorageError::not_a_file(src))?;

        let dest_path = path::join(dest, name);
        let mut dest_file = self.create_file(&dest_path).await?;

        match self.disk.copy_stream(&mut src_file, &mut dest_file).await {
            Ok(bytes) => {
                debug!(src, dest = %dest_path, bytes, "copied");
                Ok(dest_path)
            }
            Err(e) => {
                drop(dest_file);
                if let Err(cleanup) = self.delete(&dest_path).await {
                    warn!("can't remove partial copy {}: {}", dest_path, cleanup);
                }
                Err(StorageError::io(format!("can't copy {src} to {dest}"), e))
            }
        }
    }

    /// Move the file `src` into the directory `dest`: copy, then delete.
    ///
    /// Not atomic. If the copy lands but the delete fails, both entries exist
    /// and [`StorageError::MoveIncomplete`] is returned.
    pub async fn move_item(&mut self, dest: &str, src: &str) -> StorageResult<String> {
        let dest_path = self.copy(dest, src).await?;

        if let Err(e) = self.delete(src).await {
            warn!("moved {} to {} but could not delete the source: {}", src, dest_path, e);
            return Err(StorageError::MoveIncomplete {
                src: src.to_string(),
                dest: dest_path,
                source: Box::new(e),
            });
        }

        debug!(src, dest = %dest_path, "moved");
        Ok(dest_path)
    }

    /// List a directory's children, files first, each group by name.
    pub fn list(&self, path: &str) -> StorageResult<Vec<ListEntry>> {
        let node = self.index.resolve_item(path)?;
        if !node.kind().is_dir() {
            return Err(StorageError::not_a_directory(path));
        }

        let mut entries: Vec<ListEntry> = node
            .children()
            .map(|child| ListEntry {
                kind: child.kind().into(),
                name: child.name().to_string(),
                path: self.index.logical_path(child),
            })
            .collect();
        entries.sort_by(listing_order);
        Ok(entries)
    }

    /// Rebuild the whole index from disk.
    ///
    /// Returns the number of entries indexed.
    pub fn rescan(&mut self) -> StorageResult<usize> {
        let count = self
            .index
            .rescan()
            .map_err(|e| StorageError::io("can't re-scan storage dir", e))?;
        info!("re-indexed {} entries", count);
        Ok(count)
    }
}
