//! Path normalization and overlap checks.

use std::path::{Component, Path, PathBuf};

/// Normalize a path lexically: make it absolute and resolve `.` and `..`.
///
/// The filesystem is not consulted beyond reading the current directory,
/// so the path does not need to exist and symlinks are not resolved.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root.
                if normalized.parent().is_some() {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Normalize a path and resolve symlinks in its longest existing prefix.
///
/// Components past the existing prefix are kept as written, so the result
/// is meaningful for paths that are about to be created.
pub fn resolve_all(path: &Path) -> PathBuf {
    let normalized = normalize(path);
    for existing in normalized.ancestors() {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return match normalized.strip_prefix(existing) {
                Ok(rest) if rest.as_os_str().is_empty() => canonical,
                Ok(rest) => canonical.join(rest),
                Err(_) => normalized,
            };
        }
    }
    normalized
}

/// Like [`resolve_all`], but the final component is never followed.
///
/// A symlink named by `path` stays a symlink; only the directories leading
/// to it are resolved. This is the identity of the node a transfer acts on.
pub fn resolve(path: &Path) -> PathBuf {
    let normalized = normalize(path);
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => resolve_all(parent).join(name),
        _ => resolve_all(&normalized),
    }
}

/// Check whether one path equals, contains or is contained by the other.
pub fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Check whether `child` lies strictly inside `parent`.
pub fn is_strict_descendant(child: &Path, parent: &Path) -> bool {
    child != parent && child.starts_with(parent)
}
