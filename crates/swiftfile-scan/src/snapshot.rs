//! Blocking directory snapshot.

use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use swiftfile_core::{EngineConfig, EngineError, Entry};

/// Read the immediate children of `dir`.
///
/// Each child is stated on its own and follows symlinks, so a link to a file
/// reports as a file. A child that cannot be stated (a broken link, a node
/// removed mid-listing) degrades to [`swiftfile_core::EntryKind::Other`]
/// instead of failing the whole listing.
///
/// The token is checked between entries; a cancelled listing stops early
/// with [`EngineError::Interrupted`].
pub fn read_entries(
    dir: &Path,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Entry>, EngineError> {
    let metadata = fs::metadata(dir).map_err(|e| EngineError::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(EngineError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let reader = fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
    let mut entries = Vec::new();

    for child in reader {
        if cancel.is_cancelled() {
            return Err(EngineError::Interrupted);
        }

        let child = match child {
            Ok(c) => c,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let name = child.file_name();
        if config.should_skip_hidden(&name.to_string_lossy()) {
            continue;
        }

        let path = child.path();
        let entry = match fs::metadata(&path) {
            Ok(meta) => Entry::from_metadata(path, &meta),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "stat failed, reporting as other");
                Entry::other(path)
            }
        };

        if config.directories_only && !entry.is_dir() {
            continue;
        }

        entries.push(entry);
    }

    sort_entries(&mut entries);
    Ok(entries)
}

/// Sort entries with directories first, then by name.
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));
}
