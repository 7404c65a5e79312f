//! Conflict detection between transfers.
//!
//! Two kinds of conflict are handled here. A transfer can conflict with
//! itself, when its source and target overlap; such a job is rejected. And
//! jobs can conflict with each other, when their footprints overlap; such a
//! job is deferred until the earlier one finishes.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use swiftfile_core::{EngineError, path};

use crate::JobId;

/// Why a source and target cannot form a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Source and destination are the same path.
    SameFile,
    /// Cannot copy/move a directory into itself.
    SourceIsAncestor,
    /// The target would replace a directory that contains the source.
    DestinationIsAncestor,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SameFile => write!(f, "Source and destination are the same file"),
            Self::SourceIsAncestor => write!(f, "Cannot copy/move a directory into itself"),
            Self::DestinationIsAncestor => {
                write!(f, "Destination would replace a directory containing the source")
            }
        }
    }
}

/// Classify how `source` and `target` overlap, if they do.
pub fn check_transfer(source: &Path, target: &Path) -> Option<ConflictKind> {
    if source == target {
        Some(ConflictKind::SameFile)
    } else if target.starts_with(source) {
        Some(ConflictKind::SourceIsAncestor)
    } else if source.starts_with(target) {
        Some(ConflictKind::DestinationIsAncestor)
    } else {
        None
    }
}

/// Reject a transfer whose source and target overlap on disk.
///
/// Symlinked directories on either side are resolved before comparing, and
/// an existing target is also compared by file identity, so an alias or a
/// hard link of the source is never mistaken for a separate target.
pub(crate) fn validate_transfer(source: &Path, target: &Path) -> Result<(), EngineError> {
    let conflict = check_transfer(&path::resolve(source), &path::resolve(target))
        .or_else(|| is_same_node(source, target).then_some(ConflictKind::SameFile));

    match conflict {
        Some(kind) => Err(EngineError::invalid_target(target, kind.to_string())),
        None => Ok(()),
    }
}

/// Check whether two existing paths name the same filesystem node.
#[cfg(unix)]
fn is_same_node(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_node(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Index of claimed paths, keyed by normalized path.
///
/// Lookups walk the ancestors of a path and the contiguous run of its
/// descendants in key order, so a check costs a handful of map lookups
/// regardless of how many paths are claimed.
#[derive(Debug, Default)]
pub(crate) struct ConflictIndex {
    claims: BTreeMap<PathBuf, Vec<JobId>>,
}

impl ConflictIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every path of a footprint for `id`.
    pub fn claim(&mut self, id: JobId, footprint: &[PathBuf]) {
        for path in footprint {
            self.claims.entry(path.clone()).or_default().push(id);
        }
    }

    /// Release the paths claimed by `id`.
    pub fn release(&mut self, id: JobId, footprint: &[PathBuf]) {
        for path in footprint {
            if let Some(ids) = self.claims.get_mut(path) {
                ids.retain(|claimed| *claimed != id);
                if ids.is_empty() {
                    self.claims.remove(path);
                }
            }
        }
    }

    /// Find a job whose claim overlaps any path of the footprint.
    pub fn find_overlap(&self, footprint: &[PathBuf]) -> Option<JobId> {
        footprint.iter().find_map(|path| self.overlapping(path))
    }

    fn overlapping(&self, path: &Path) -> Option<JobId> {
        // Equal path or an ancestor of it.
        for ancestor in path.ancestors() {
            if let Some(id) = self.claims.get(ancestor).and_then(|ids| ids.first()) {
                return Some(*id);
            }
        }

        // Descendants sort directly after the path itself.
        self.claims
            .range::<Path, _>((Bound::Excluded(path), Bound::Unbounded))
            .next()
            .filter(|(claimed, _)| claimed.starts_with(path))
            .and_then(|(_, ids)| ids.first().copied())
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
