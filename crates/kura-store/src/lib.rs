//! # kura-store
//!
//! Path index and storage engine for kura, a single-node file store.
//!
//! - [`Index`] - in-memory tree mirroring the storage root, built by one scan
//! - [`Storage`] - the engine: resolves logical paths against the index,
//!   performs the disk call, updates the index, all under one lock
//! - [`Disk`] - the syscall seam; [`LocalDisk`] is the real thing
//!
//! ## Logical paths
//!
//! Callers address entries with `/`-separated paths relative to the root,
//! e.g. `/docs/a.txt`. Every ancestor must already exist as a directory.

pub mod disk;
mod error;
pub mod index;
mod listing;
pub mod path;
mod storage;

pub use disk::{Disk, LocalDisk};
#[cfg(any(test, feature = "test-mock"))]
pub use disk::{DiskOp, FailingDisk};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use index::{Index, Node, NodeKind};
pub use listing::{listing_order, EntryKind, ListEntry};
pub use storage::{Storage, StorageGuard};
