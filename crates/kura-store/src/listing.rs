//! Directory listing entries and their ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::index::NodeKind;

/// Entry type as it appears in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Dir,
}

impl From<NodeKind> for EntryKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::File => EntryKind::File,
            NodeKind::Directory => EntryKind::Dir,
        }
    }
}

impl EntryKind {
    fn tag(self) -> u8 {
        match self {
            EntryKind::File => NodeKind::File.tag(),
            EntryKind::Dir => NodeKind::Directory.tag(),
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    /// Logical path, e.g. `/docs/a.txt`.
    pub path: String,
}

/// Listing order: entries of the same kind compare by name, entries of
/// different kinds compare by kind tag only.
///
/// Files (tag 0) therefore come before directories (tag 1), and names are
/// compared byte-wise, so `B` sorts before `a`.
pub fn listing_order(a: &ListEntry, b: &ListEntry) -> Ordering {
    if a.kind == b.kind {
        a.name.cmp(&b.name)
    } else {
        a.kind.tag().cmp(&b.kind.tag())
    }
}
