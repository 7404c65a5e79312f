//! Progress reporting types for transfer jobs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Progress information for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Number of files completed.
    pub files_completed: usize,
    /// Total number of files to process (0 if unknown).
    pub files_total: usize,
    /// Number of bytes processed so far.
    pub bytes_processed: u64,
    /// Total bytes to process (0 if unknown).
    pub bytes_total: u64,
    /// The file most recently processed.
    pub current_file: Option<PathBuf>,
}

impl TransferProgress {
    /// Create a progress record for a known amount of work.
    pub fn new(files_total: usize, bytes_total: u64) -> Self {
        Self {
            files_total,
            bytes_total,
            ..Self::default()
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.bytes_total > 0 {
            (self.bytes_processed as f64 / self.bytes_total as f64) * 100.0
        } else if self.files_total > 0 {
            (self.files_completed as f64 / self.files_total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Increment the completed count and add bytes.
    pub fn complete_file(&mut self, bytes: u64) {
        self.files_completed += 1;
        self.bytes_processed += bytes;
    }

    /// Mark all known work as done.
    pub fn finish(&mut self) {
        self.files_completed = self.files_completed.max(self.files_total);
        self.bytes_processed = self.bytes_processed.max(self.bytes_total);
    }
}

/// Accumulates progress inside a worker and emits throttled snapshots.
pub(crate) struct ProgressTracker<'a> {
    progress: TransferProgress,
    interval: Duration,
    last_emit: Instant,
    emit: &'a (dyn Fn(&TransferProgress) + Send + Sync),
}

impl<'a> ProgressTracker<'a> {
    pub fn new(
        progress: TransferProgress,
        interval: Duration,
        emit: &'a (dyn Fn(&TransferProgress) + Send + Sync),
    ) -> Self {
        Self {
            progress,
            interval,
            last_emit: Instant::now(),
            emit,
        }
    }

    /// Record one finished file.
    pub fn file_done(&mut self, path: &Path, bytes: u64) {
        self.progress.complete_file(bytes);
        self.progress.current_file = Some(path.to_path_buf());

        if self.last_emit.elapsed() >= self.interval {
            (self.emit)(&self.progress);
            self.last_emit = Instant::now();
        }
    }

    /// Record a whole subtree moved in one step.
    pub fn all_done(&mut self, path: &Path) {
        self.progress.finish();
        self.progress.current_file = Some(path.to_path_buf());
    }

    pub fn into_progress(self) -> TransferProgress {
        self.progress
    }
}

/// A tracker that never emits, for exercising jobs directly.
#[cfg(test)]
pub(crate) fn quiet_tracker() -> ProgressTracker<'static> {
    fn ignore(_: &TransferProgress) {}
    ProgressTracker::new(TransferProgress::default(), Duration::from_secs(3600), &ignore)
}

/// Count files and bytes under `path` without following symlinks.
pub(crate) fn measure(path: &Path) -> (usize, u64) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return (0, 0);
    };

    if meta.file_type().is_symlink() {
        return (1, 0);
    }
    if !meta.is_dir() {
        return (1, meta.len());
    }

    let mut files = 0;
    let mut bytes = 0u64;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let (f, b) = measure(&entry.path());
            files += f;
            bytes += b;
        }
    }
    (files, bytes)
}
