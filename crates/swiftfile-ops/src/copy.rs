//! Copy jobs.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use swiftfile_core::EngineError;

use crate::conflict::validate_transfer;
use crate::progress::ProgressTracker;

/// Copy `source` into `destination_dir` under its own name.
///
/// An existing target is replaced, never merged. If the copy fails part way,
/// whatever was written of the target is removed again.
pub(crate) fn copy_job(
    source: &Path,
    destination_dir: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> Result<(), EngineError> {
    let source_meta = fs::symlink_metadata(source).map_err(|e| EngineError::io(source, e))?;
    let target = target_for(source, destination_dir)?;
    validate_transfer(source, &target)?;
    prepare_destination(destination_dir)?;
    clear_target(&target, &source_meta)?;

    if let Err(err) = copy_tree(source, &target, tracker) {
        discard_partial(&target);
        return Err(err);
    }
    Ok(())
}

/// Path the source lands at inside `destination_dir`.
pub(crate) fn target_for(source: &Path, destination_dir: &Path) -> Result<PathBuf, EngineError> {
    let name = source
        .file_name()
        .ok_or_else(|| EngineError::invalid_target(source, "Source has no file name"))?;
    Ok(destination_dir.join(name))
}

/// Make sure the destination directory exists, creating it if needed.
pub(crate) fn prepare_destination(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::NotADirectory {
            path: dir.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))
        }
        Err(e) => Err(EngineError::io(dir, e)),
    }
}

/// Remove an existing target so the source replaces it.
///
/// A regular file about to be replaced by a regular file is left alone; the
/// copy or rename overwrites it in place.
pub(crate) fn clear_target(target: &Path, source_meta: &Metadata) -> Result<(), EngineError> {
    let Ok(existing) = fs::symlink_metadata(target) else {
        return Ok(());
    };
    if existing.is_file() && source_meta.is_file() {
        return Ok(());
    }
    tracing::debug!(target = %target.display(), "replacing existing target");
    remove_path(target).map_err(|e| EngineError::io(target, e))
}

/// Recursively copy a file, symlink or directory.
pub(crate) fn copy_tree(
    source: &Path,
    target: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> Result<(), EngineError> {
    let meta = fs::symlink_metadata(source).map_err(|e| EngineError::io(source, e))?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        copy_symlink(source, target)?;
        tracker.file_done(target, 0);
    } else if file_type.is_dir() {
        fs::create_dir_all(target).map_err(|e| EngineError::io(target, e))?;

        let entries = fs::read_dir(source).map_err(|e| EngineError::io(source, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(source, e))?;
            copy_tree(&entry.path(), &target.join(entry.file_name()), tracker)?;
        }
    } else {
        let bytes = fs::copy(source, target).map_err(|e| EngineError::io(source, e))?;
        tracker.file_done(target, bytes);
    }

    Ok(())
}

/// Recreate a symlink without following it.
fn copy_symlink(source: &Path, target: &Path) -> Result<(), EngineError> {
    let link_target = fs::read_link(source).map_err(|e| EngineError::io(source, e))?;

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&link_target, target).map_err(|e| EngineError::io(target, e))
    }

    #[cfg(windows)]
    {
        // A broken link cannot tell us its kind; default to a file link.
        let is_dir = fs::metadata(source).map(|m| m.is_dir()).unwrap_or(false);
        let result = if is_dir {
            std::os::windows::fs::symlink_dir(&link_target, target)
        } else {
            std::os::windows::fs::symlink_file(&link_target, target)
        };
        result.map_err(|e| EngineError::io(target, e))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = link_target;
        Err(EngineError::invalid_target(
            target,
            "Symlinks are not supported on this platform",
        ))
    }
}

/// Remove a file, symlink or directory tree.
///
/// Symlinks are removed as links; their targets are never touched.
pub(crate) fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Best-effort removal of a partially written target.
pub(crate) fn discard_partial(target: &Path) {
    match remove_path(target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(target = %target.display(), error = %e, "could not remove partial copy");
        }
    }
}
