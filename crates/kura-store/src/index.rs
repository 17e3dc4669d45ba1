//! In-memory path index.
//!
//! A tree of [`Node`]s mirroring the on-disk hierarchy under the storage root.
//! Built once by a full scan at startup, then kept in step by the engine on
//! every mutation. Resolution never touches the disk.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{StorageError, StorageResult};
use crate::path::LogicalPath;

/// Node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl NodeKind {
    /// Ordering tag used by listings. Files sort before directories.
    pub fn tag(self) -> u8 {
        match self {
            NodeKind::File => 0,
            NodeKind::Directory => 1,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(self) -> bool {
        matches!(self, NodeKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

/// One file or directory known to the index.
///
/// Only directories carry a children map.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    name: String,
    physical: PathBuf,
    children: Option<HashMap<String, Node>>,
}

impl Node {
    /// A file node.
    pub fn file(name: impl Into<String>, physical: impl Into<PathBuf>) -> Self {
        Self {
            kind: NodeKind::File,
            name: name.into(),
            physical: physical.into(),
            children: None,
        }
    }

    /// An empty directory node.
    pub fn directory(name: impl Into<String>, physical: impl Into<PathBuf>) -> Self {
        Self {
            kind: NodeKind::Directory,
            name: name.into(),
            physical: physical.into(),
            children: Some(HashMap::new()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Last path segment. Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// On-disk location.
    pub fn physical(&self) -> &Path {
        &self.physical
    }

    /// Child nodes, in no particular order. Empty for files.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().flat_map(|c| c.values())
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.as_ref()?.get(name)
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.as_mut()?.get_mut(name)
    }

    pub(crate) fn insert_child(&mut self, node: Node) {
        debug_assert!(self.kind.is_dir(), "inserting into a file node");
        if let Some(children) = self.children.as_mut() {
            children.insert(node.name.clone(), node);
        }
    }

    pub(crate) fn remove_child(&mut self, name: &str) -> Option<Node> {
        self.children.as_mut()?.remove(name)
    }

    /// Number of nodes below this one.
    fn descendants(&self) -> usize {
        self.children().map(|c| 1 + c.descendants()).sum()
    }

    /// Rebuild this directory's subtree from disk.
    ///
    /// Returns the number of entries found. No-op for files.
    pub(crate) fn rescan(&mut self) -> io::Result<usize> {
        if !self.kind.is_dir() {
            return Ok(0);
        }
        self.children = Some(HashMap::new());
        self.populate()
    }

    /// Insert every entry under `physical` into this (empty) directory node.
    fn populate(&mut self) -> io::Result<usize> {
        let base = self.physical.clone();
        let walker = WalkDir::new(&base)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                let utf8 = entry.file_name().to_str().is_some();
                if !utf8 {
                    tracing::warn!("skipping non-UTF-8 entry {}", entry.path().display());
                }
                utf8
            });

        let mut count = 0;
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(&base)
                .map_err(io::Error::other)?;

            // Parents are yielded before their contents, so the chain exists.
            let mut parent: &mut Node = self;
            for component in relative.parent().into_iter().flat_map(|p| p.components()) {
                let segment = component.as_os_str().to_string_lossy();
                parent = parent.child_mut(&segment).ok_or_else(|| {
                    io::Error::other(format!("scan reached {} before its parent", relative.display()))
                })?;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let physical = parent.physical.join(&name);
            let node = if entry.file_type().is_dir() {
                Node::directory(name, physical)
            } else {
                Node::file(name, physical)
            };
            parent.insert_child(node);
            count += 1;
        }

        Ok(count)
    }
}

/// The index tree, rooted at the storage root.
#[derive(Debug)]
pub struct Index {
    root: Node,
}

impl Index {
    /// Build the index by recursively scanning `root`.
    pub fn scan(root: impl Into<PathBuf>) -> io::Result<Self> {
        let mut root = Node::directory("", root);
        root.populate()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of entries below the root.
    pub fn len(&self) -> usize {
        self.root.descendants()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children().next().is_none()
    }

    /// Find the directory that contains (or would contain) `path`'s target.
    ///
    /// `/` resolves to the root itself. Fails with `BadPath` if the path is
    /// malformed, an ancestor is missing, or the last ancestor is not a
    /// directory.
    pub fn resolve_parent(&self, path: &str) -> StorageResult<&Node> {
        let parents = match LogicalPath::parse(path)? {
            LogicalPath::Root => return Ok(&self.root),
            LogicalPath::Child { parents, .. } => parents,
        };

        let mut node = &self.root;
        for segment in parents {
            node = node
                .child(segment)
                .ok_or_else(|| StorageError::bad_path(path))?;
        }
        if node.kind.is_dir() {
            Ok(node)
        } else {
            Err(StorageError::bad_path(path))
        }
    }

    /// Find the node at `path`. Any resolution failure is `NotFound`.
    pub fn resolve_item(&self, path: &str) -> StorageResult<&Node> {
        let not_found = || StorageError::not_found(path);
        let Ok(target) = LogicalPath::parse(path) else {
            return Err(not_found());
        };
        let Some(name) = target.name() else {
            return Ok(&self.root);
        };
        self.resolve_parent(path)
            .ok()
            .and_then(|parent| parent.child(name))
            .ok_or_else(not_found)
    }

    /// Mutable form of [`Index::resolve_parent`] for an already parsed path.
    pub(crate) fn parent_mut(
        &mut self,
        path: &str,
        target: &LogicalPath<'_>,
    ) -> StorageResult<&mut Node> {
        let parents = match target {
            LogicalPath::Root => return Ok(&mut self.root),
            LogicalPath::Child { parents, .. } => parents,
        };

        let mut node = &mut self.root;
        for segment in parents {
            node = node
                .child_mut(segment)
                .ok_or_else(|| StorageError::bad_path(path))?;
        }
        if node.kind.is_dir() {
            Ok(node)
        } else {
            Err(StorageError::bad_path(path))
        }
    }

    /// Logical path of a node: its physical path with the root prefix stripped.
    pub fn logical_path(&self, node: &Node) -> String {
        let relative = node
            .physical
            .strip_prefix(&self.root.physical)
            .unwrap_or(&node.physical);

        let mut logical = String::new();
        for component in relative.components() {
            logical.push('/');
            logical.push_str(&component.as_os_str().to_string_lossy());
        }
        if logical.is_empty() {
            logical.push('/');
        }
        logical
    }

    /// Throw the tree away and rebuild it from disk.
    pub(crate) fn rescan(&mut self) -> io::Result<usize> {
        self.root.rescan()
    }
}
