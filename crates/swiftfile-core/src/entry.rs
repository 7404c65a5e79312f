//! Directory entry snapshots.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Kind of a filesystem node, as observed when it was listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Anything else: devices, sockets, broken symlinks, unreadable nodes.
    Other,
}

impl EntryKind {
    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// One filesystem node observed at listing time.
///
/// Entries are value snapshots. They do not track the filesystem after
/// creation; a stale entry is refreshed by listing its directory again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Absolute path of the node.
    pub path: PathBuf,
    /// Final path component.
    pub name: CompactString,
    /// Kind of node.
    pub kind: EntryKind,
    /// Size in bytes. Always 0 unless `kind` is [`EntryKind::File`].
    pub size: u64,
    /// Last modification time. Only reported for files.
    pub modified: Option<SystemTime>,
}

impl Entry {
    /// Build an entry from already-fetched metadata.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata) -> Self {
        let path = path.into();
        let name = file_name_of(&path);

        if metadata.is_file() {
            Self {
                path,
                name,
                kind: EntryKind::File,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            }
        } else if metadata.is_dir() {
            Self {
                path,
                name,
                kind: EntryKind::Directory,
                size: 0,
                modified: None,
            }
        } else {
            Self::other(path)
        }
    }

    /// Build an entry whose kind could not be resolved.
    pub fn other(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: file_name_of(&path),
            path,
            kind: EntryKind::Other,
            size: 0,
            modified: None,
        }
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if the name starts with a dot.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

fn file_name_of(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}
