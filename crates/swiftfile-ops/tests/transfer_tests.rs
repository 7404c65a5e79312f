use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swiftfile_core::{EngineConfig, FailureKind, WorkerPool};
use swiftfile_ops::{JobId, JobState, JobUpdate, TransferAction, TransferEngine};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn new_engine() -> TransferEngine {
    let config = EngineConfig::default();
    let pool = WorkerPool::from_config(&config).unwrap();
    TransferEngine::new(pool, config)
}

fn create_source_tree(root: &Path) {
    fs::create_dir_all(root.join("src/nested/deeper")).unwrap();
    fs::write(root.join("src/a.txt"), "alpha").unwrap();
    fs::write(root.join("src/nested/b.bin"), vec![7u8; 4096]).unwrap();
    fs::write(root.join("src/nested/deeper/c.txt"), "gamma gamma").unwrap();
}

/// Relative path -> contents for every file under `root`.
fn snapshot(root: &Path) -> HashMap<String, Vec<u8>> {
    let mut files = HashMap::new();
    collect(root, root, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut HashMap<String, Vec<u8>>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
            files.insert(rel, fs::read(&path).unwrap());
        }
    }
}

async fn wait_done(engine_job: &swiftfile_ops::JobHandle) -> JobState {
    timeout(WAIT, engine_job.wait()).await.expect("job timed out")
}

async fn drain_until_terminal(
    rx: &mut UnboundedReceiver<JobUpdate>,
    jobs: &[JobId],
) -> Vec<JobUpdate> {
    let mut updates = Vec::new();
    let mut remaining: HashSet<JobId> = jobs.iter().copied().collect();

    while !remaining.is_empty() {
        let update = timeout(WAIT, rx.recv())
            .await
            .expect("update timed out")
            .expect("engine dropped");
        if update.state.is_terminal() {
            remaining.remove(&update.id);
        }
        updates.push(update);
    }
    updates
}

#[tokio::test]
async fn test_copy_overwrites_existing_file() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a")).unwrap();
    fs::create_dir_all(temp.path().join("b")).unwrap();
    fs::write(temp.path().join("a/file.txt"), vec![b's'; 20]).unwrap();
    fs::write(temp.path().join("b/file.txt"), vec![b'd'; 10]).unwrap();

    let engine = new_engine();
    let job = engine.copy(temp.path().join("a/file.txt"), temp.path().join("b"));

    assert_eq!(job.action(), TransferAction::Copy);
    assert_eq!(wait_done(&job).await, JobState::Succeeded);

    let copied = fs::read(temp.path().join("b/file.txt")).unwrap();
    assert_eq!(copied.len(), 20);
    assert_eq!(copied, fs::read(temp.path().join("a/file.txt")).unwrap());
}

#[tokio::test]
async fn test_copy_then_delete_source_keeps_identical_copy() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());
    let original = snapshot(&temp.path().join("src"));

    let engine = new_engine();
    let copy = engine.copy(temp.path().join("src"), temp.path().join("backup"));
    assert_eq!(wait_done(&copy).await, JobState::Succeeded);

    let delete = engine.delete(temp.path().join("src"));
    assert_eq!(wait_done(&delete).await, JobState::Succeeded);

    assert!(!temp.path().join("src").exists());
    assert_eq!(snapshot(&temp.path().join("backup/src")), original);
}

#[tokio::test]
async fn test_move_relocates_tree() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());
    let original = snapshot(&temp.path().join("src"));

    let engine = new_engine();
    let job = engine.move_to(temp.path().join("src"), temp.path().join("moved"));
    assert_eq!(wait_done(&job).await, JobState::Succeeded);

    assert!(!temp.path().join("src").exists());
    assert_eq!(snapshot(&temp.path().join("moved/src")), original);
}

#[tokio::test]
async fn test_failed_move_leaves_source_intact() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());
    let original = snapshot(&temp.path().join("src"));
    fs::write(temp.path().join("not-a-dir"), "plain file").unwrap();

    let engine = new_engine();
    let job = engine.move_to(temp.path().join("src"), temp.path().join("not-a-dir"));

    let state = wait_done(&job).await;
    let failure = state.failure().expect("move should fail").clone();
    assert_eq!(failure.kind, FailureKind::NotADirectory);
    assert_eq!(snapshot(&temp.path().join("src")), original);
}

#[tokio::test]
async fn test_copy_into_itself_fails() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());

    let engine = new_engine();
    let job = engine.copy(temp.path().join("src"), temp.path().join("src/nested"));

    let state = wait_done(&job).await;
    assert_eq!(state.failure().unwrap().kind, FailureKind::InvalidTarget);
    assert!(!temp.path().join("src/nested/src").exists());
}

#[tokio::test]
async fn test_delete_missing_path_reports_not_found() {
    let temp = TempDir::new().unwrap();
    let engine = new_engine();
    let mut rx = engine.subscribe();

    let job = engine.delete(temp.path().join("missing"));
    let updates = drain_until_terminal(&mut rx, &[job.id()]).await;

    let last = updates.last().unwrap();
    assert_eq!(last.id, job.id());
    assert_eq!(last.error().unwrap().kind, FailureKind::NotFound);
}

#[tokio::test]
async fn test_update_sequence_for_one_job() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());

    let engine = new_engine();
    let seen: Arc<Mutex<Vec<JobState>>> = Arc::default();
    let seen_cb = seen.clone();
    engine.on_job_update(move |update| {
        let mut seen = seen_cb.lock().unwrap();
        if seen.last() != Some(&update.state) {
            seen.push(update.state.clone());
        }
    });
    let mut rx = engine.subscribe();

    let job = engine.copy(temp.path().join("src"), temp.path().join("dst"));
    let updates = drain_until_terminal(&mut rx, &[job.id()]).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![JobState::Queued, JobState::Running, JobState::Succeeded]
    );
    let last = updates.last().unwrap();
    assert_eq!(last.progress.files_completed, 3);
    assert_eq!(last.progress.bytes_processed, 5 + 4096 + 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_jobs_never_run_together() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());
    let dst = temp.path().join("dst");

    let engine = new_engine();
    let mut rx = engine.subscribe();

    let first = engine.copy(temp.path().join("src"), &dst);
    let second = engine.delete(dst.join("src"));
    let third = engine.copy(temp.path().join("src"), &dst);
    let ids = [first.id(), second.id(), third.id()];

    let updates = drain_until_terminal(&mut rx, &ids).await;

    let mut running: HashSet<JobId> = HashSet::new();
    let mut start_order = Vec::new();
    for update in &updates {
        match update.state {
            JobState::Running => {
                assert!(
                    running.iter().all(|id| *id == update.id),
                    "{} ran alongside {:?}",
                    update.id,
                    running
                );
                if running.insert(update.id) {
                    start_order.push(update.id);
                }
            }
            ref state if state.is_terminal() => {
                assert_eq!(*state, JobState::Succeeded);
                running.remove(&update.id);
            }
            _ => {}
        }
    }

    assert_eq!(start_order, ids.to_vec());
    assert!(dst.join("src/nested/deeper/c.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_jobs_all_complete() {
    let temp = TempDir::new().unwrap();
    for i in 0..6 {
        let dir = temp.path().join(format!("src{i}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("data.txt"), format!("payload {i}")).unwrap();
    }

    let engine = new_engine();
    let jobs: Vec<_> = (0..6)
        .map(|i| {
            engine.copy(
                temp.path().join(format!("src{i}")),
                temp.path().join(format!("dst{i}")),
            )
        })
        .collect();

    for job in &jobs {
        assert_eq!(wait_done(job).await, JobState::Succeeded);
    }
    for i in 0..6 {
        let copied = temp.path().join(format!("dst{i}/src{i}/data.txt"));
        assert_eq!(fs::read_to_string(copied).unwrap(), format!("payload {i}"));
    }
    assert_eq!(engine.pending_jobs(), 0);
}

#[tokio::test]
async fn test_cancel_only_while_queued() {
    let temp = TempDir::new().unwrap();
    create_source_tree(temp.path());

    let engine = new_engine();
    let first = engine.copy(temp.path().join("src"), temp.path().join("dst"));
    // Overlaps the first job, so it stays queued behind it.
    let second = engine.delete(temp.path().join("dst"));

    assert!(second.cancel());
    assert!(!second.cancel());
    assert_eq!(wait_done(&second).await, JobState::Cancelled);

    assert_eq!(wait_done(&first).await, JobState::Succeeded);
    assert!(!first.cancel());
    assert!(temp.path().join("dst/src/a.txt").exists());
    assert!(engine.state(first.id()).is_none());
}

#[tokio::test]
async fn test_import_copies_into_drop_target() {
    let temp = TempDir::new().unwrap();
    let incoming = temp.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("one.txt"), "1").unwrap();
    fs::write(incoming.join("two.txt"), "2").unwrap();
    let target = temp.path().join("target");
    fs::create_dir_all(&target).unwrap();

    let engine = new_engine();
    let jobs = engine.import([incoming.join("one.txt"), incoming.join("two.txt")], &target);

    assert_eq!(jobs.len(), 2);
    for job in &jobs {
        assert_eq!(wait_done(job).await, JobState::Succeeded);
    }
    assert_eq!(fs::read_to_string(target.join("one.txt")).unwrap(), "1");
    assert_eq!(fs::read_to_string(target.join("two.txt")).unwrap(), "2");
}

#[cfg(unix)]
#[tokio::test]
async fn test_transfers_onto_aliased_self_keep_source() {
    let temp = TempDir::new().unwrap();
    let src_dir = temp.path().join("a");
    fs::create_dir_all(src_dir.join("photos")).unwrap();
    fs::write(src_dir.join("photos/beach.jpg"), "jpeg").unwrap();
    fs::write(src_dir.join("file.txt"), vec![b's'; 20]).unwrap();
    let alias = temp.path().join("alias");
    std::os::unix::fs::symlink(&src_dir, &alias).unwrap();
    let original = snapshot(&src_dir);

    let engine = new_engine();
    let jobs = [
        engine.copy(src_dir.join("file.txt"), &alias),
        engine.copy(src_dir.join("photos"), &alias),
        engine.move_to(src_dir.join("photos"), &alias),
    ];

    for job in &jobs {
        let state = wait_done(job).await;
        assert_eq!(
            state.failure().map(|f| f.kind),
            Some(FailureKind::InvalidTarget),
            "{} {} was not rejected",
            job.id(),
            job.action()
        );
    }
    assert_eq!(snapshot(&src_dir), original);
}

#[cfg(unix)]
#[tokio::test]
async fn test_delete_with_unremovable_child_removes_siblings() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("tree");
    fs::create_dir_all(tree.join("locked")).unwrap();
    fs::create_dir_all(tree.join("open/inner")).unwrap();
    fs::write(tree.join("locked/stuck.txt"), "stuck").unwrap();
    fs::write(tree.join("sibling.txt"), "bye").unwrap();
    fs::write(tree.join("open/inner/file.txt"), "bye").unwrap();
    fs::set_permissions(tree.join("locked"), fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users ignore permission bits; nothing to check then.
    if fs::write(tree.join("locked/probe"), "").is_ok() {
        fs::set_permissions(tree.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let engine = new_engine();
    let job = engine.delete(&tree);
    let state = wait_done(&job).await;

    fs::set_permissions(tree.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(state.failure().unwrap().kind, FailureKind::NotEmptyOrPermission);
    assert!(!tree.join("sibling.txt").exists());
    assert!(!tree.join("open").exists());
    assert!(tree.join("locked/stuck.txt").exists());
}
