//! Delete jobs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use swiftfile_core::EngineError;

use crate::progress::ProgressTracker;

/// Delete a file, symlink, or a directory with all of its contents.
///
/// Removal is best-effort: a child that cannot be removed does not stop its
/// siblings from being removed. The job then fails with
/// [`EngineError::NotEmptyOrPermission`], and whatever was removed stays
/// removed.
pub(crate) fn delete_job(path: &Path, tracker: &mut ProgressTracker<'_>) -> Result<(), EngineError> {
    let meta = fs::symlink_metadata(path).map_err(|e| EngineError::io(path, e))?;

    if !meta.is_dir() {
        fs::remove_file(path).map_err(|e| EngineError::io(path, e))?;
        tracker.file_done(path, meta.len());
        return Ok(());
    }

    remove_all(path, tracker)
}

/// Remove a directory tree, continuing past failures.
pub(crate) fn remove_all(dir: &Path, tracker: &mut ProgressTracker<'_>) -> Result<(), EngineError> {
    let mut report = RemovalReport::default();
    remove_tree(dir, tracker, &mut report);
    report.into_result(dir)
}

#[derive(Debug, Default)]
struct RemovalReport {
    remaining: usize,
    first_error: Option<(PathBuf, io::Error)>,
}

impl RemovalReport {
    fn record(&mut self, path: &Path, err: io::Error) {
        tracing::debug!(path = %path.display(), error = %err, "could not remove");
        self.remaining += 1;
        if self.first_error.is_none() {
            self.first_error = Some((path.to_path_buf(), err));
        }
    }

    fn into_result(self, root: &Path) -> Result<(), EngineError> {
        match self.first_error {
            None => Ok(()),
            Some((path, err)) => Err(EngineError::NotEmptyOrPermission {
                path: root.to_path_buf(),
                remaining: self.remaining,
                reason: format!("{}: {}", path.display(), err),
            }),
        }
    }
}

fn remove_tree(dir: &Path, tracker: &mut ProgressTracker<'_>, report: &mut RemovalReport) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            report.record(dir, err);
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                report.record(dir, err);
                continue;
            }
        };
        let path = entry.path();

        // DirEntry::file_type does not follow symlinks.
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => remove_tree(&path, tracker, report),
            _ => {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                match fs::remove_file(&path) {
                    Ok(()) => tracker.file_done(&path, size),
                    Err(err) => report.record(&path, err),
                }
            }
        }
    }

    if let Err(err) = fs::remove_dir(dir) {
        report.record(dir, err);
    }
}
