//! Move jobs.

use std::fs;
use std::io;
use std::path::Path;

use swiftfile_core::EngineError;

use crate::conflict::validate_transfer;
use crate::copy::{clear_target, copy_tree, discard_partial, prepare_destination, target_for};
use crate::delete::remove_all;
use crate::progress::ProgressTracker;

/// Move `source` into `destination_dir` under its own name.
///
/// A same-volume move is a single rename. When the rename reports that it
/// would cross devices, the move falls back to copy then delete; the delete
/// phase only runs once the copy phase has fully succeeded.
pub(crate) fn move_job(
    source: &Path,
    destination_dir: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> Result<(), EngineError> {
    let source_meta = fs::symlink_metadata(source).map_err(|e| EngineError::io(source, e))?;
    let target = target_for(source, destination_dir)?;
    validate_transfer(source, &target)?;
    prepare_destination(destination_dir)?;
    clear_target(&target, &source_meta)?;

    match fs::rename(source, &target) {
        Ok(()) => {
            tracker.all_done(&target);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                source = %source.display(),
                target = %target.display(),
                "rename crosses devices, falling back to copy and delete"
            );
            move_across_devices(source, &target, tracker)
        }
        Err(e) => Err(EngineError::io(source, e)),
    }
}

/// Copy `source` to `target`, then delete `source`.
pub(crate) fn move_across_devices(
    source: &Path,
    target: &Path,
    tracker: &mut ProgressTracker<'_>,
) -> Result<(), EngineError> {
    if let Err(err) = copy_tree(source, target, tracker) {
        discard_partial(target);
        return Err(err);
    }

    let meta = fs::symlink_metadata(source).map_err(|e| EngineError::io(source, e))?;
    if meta.is_dir() {
        remove_all(source, tracker)
    } else {
        fs::remove_file(source).map_err(|e| EngineError::io(source, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::quiet_tracker as tracker;
    use tempfile::TempDir;

    #[test]
    fn test_move_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("photos");
        fs::create_dir_all(src.join("2024")).unwrap();
        fs::write(src.join("2024/beach.jpg"), "sand").unwrap();
        let dest = temp.path().join("archive");

        move_job(&src, &dest, &mut tracker()).unwrap();

        assert!(!src.exists());
        assert_eq!(
            fs::read_to_string(dest.join("photos/2024/beach.jpg")).unwrap(),
            "sand"
        );
    }

    #[test]
    fn test_move_file_replaces_existing() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("file.txt"), "new contents").unwrap();
        fs::write(temp.path().join("b/file.txt"), "old").unwrap();

        move_job(&temp.path().join("file.txt"), &temp.path().join("b"), &mut tracker()).unwrap();

        assert!(!temp.path().join("file.txt").exists());
        assert_eq!(
            fs::read_to_string(temp.path().join("b/file.txt")).unwrap(),
            "new contents"
        );
    }

    #[test]
    fn test_move_into_parent_is_same_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("stay.txt");
        fs::write(&file, "x").unwrap();

        let result = move_job(&file, temp.path(), &mut tracker());
        assert!(matches!(result, Err(EngineError::InvalidTarget { .. })));
        assert!(file.exists());
    }

    #[test]
    fn test_fallback_copies_then_deletes() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("deep")).unwrap();
        fs::write(src.join("deep/a.txt"), "a").unwrap();
        let target = temp.path().join("dst");

        move_across_devices(&src, &target, &mut tracker()).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(target.join("deep/a.txt")).unwrap(), "a");
    }

    #[test]
    fn test_failed_fallback_copy_keeps_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("blocker"), "file").unwrap();

        // A regular file in the middle of the target path makes the copy fail.
        let target = temp.path().join("blocker/dst");
        let result = move_across_devices(&src, &target, &mut tracker());

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(src.join("a.txt")).unwrap(), "a");
    }

    #[cfg(unix)]
    #[test]
    fn test_move_onto_aliased_self_keeps_source() {
        let temp = TempDir::new().unwrap();
        let src_dir = temp.path().join("a");
        fs::create_dir_all(src_dir.join("photos")).unwrap();
        fs::write(src_dir.join("photos/beach.jpg"), "jpeg").unwrap();
        let alias = temp.path().join("alias");
        std::os::unix::fs::symlink(&src_dir, &alias).unwrap();

        let result = move_job(&src_dir.join("photos"), &alias, &mut tracker());
        assert!(matches!(result, Err(EngineError::InvalidTarget { .. })));
        assert_eq!(
            fs::read_to_string(src_dir.join("photos/beach.jpg")).unwrap(),
            "jpeg"
        );
    }
}
