//! Transfer engine: job submission, admission and completion.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use swiftfile_core::{EngineConfig, EngineError, Failure, Notifier, WorkerPool, path};

use crate::copy::copy_job;
use crate::delete::delete_job;
use crate::job::{JobHandle, JobId, JobSpec, JobState, JobUpdate, TransferAction};
use crate::move_op::move_job;
use crate::progress::{ProgressTracker, TransferProgress, measure};
use crate::scheduler::Scheduler;

/// State shared between the engine, its handles and its workers.
pub(crate) struct Shared {
    scheduler: Mutex<Scheduler>,
    notifier: Notifier<JobUpdate>,
    pool: WorkerPool,
    config: EngineConfig,
}

/// Executes copy, move and delete jobs off the caller's thread.
///
/// Every entry point returns a [`JobHandle`] immediately; outcomes are
/// delivered to observers registered with [`TransferEngine::on_job_update`]
/// or [`TransferEngine::subscribe`]. Jobs whose paths overlap run one after
/// another in submission order; jobs on disjoint paths run in parallel on
/// the worker pool.
///
/// Failures are never retried. A caller that wants a retry submits a new
/// job.
#[derive(Clone)]
pub struct TransferEngine {
    shared: Arc<Shared>,
}

impl TransferEngine {
    /// Create an engine that runs its jobs on `pool`.
    pub fn new(pool: WorkerPool, config: EngineConfig) -> Self {
        let notifier = Notifier::new(&pool);
        Self {
            shared: Arc::new(Shared {
                scheduler: Mutex::new(Scheduler::new()),
                notifier,
                pool,
                config,
            }),
        }
    }

    /// Copy `source` into `destination_dir`, replacing any existing target.
    pub fn copy(&self, source: impl AsRef<Path>, destination_dir: impl AsRef<Path>) -> JobHandle {
        self.submit(
            TransferAction::Copy,
            source.as_ref(),
            Some(destination_dir.as_ref()),
        )
    }

    /// Move `source` into `destination_dir`, replacing any existing target.
    pub fn move_to(
        &self,
        source: impl AsRef<Path>,
        destination_dir: impl AsRef<Path>,
    ) -> JobHandle {
        self.submit(
            TransferAction::Move,
            source.as_ref(),
            Some(destination_dir.as_ref()),
        )
    }

    /// Delete a file or a directory tree.
    pub fn delete(&self, path: impl AsRef<Path>) -> JobHandle {
        self.submit(TransferAction::Delete, path.as_ref(), None)
    }

    /// Copy several sources into one destination directory, as a drop does.
    pub fn import<I, P>(&self, sources: I, destination_dir: impl AsRef<Path>) -> Vec<JobHandle>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let destination_dir = destination_dir.as_ref();
        sources
            .into_iter()
            .map(|source| self.copy(source, destination_dir))
            .collect()
    }

    /// Register a callback for job updates.
    pub fn on_job_update<F>(&self, callback: F)
    where
        F: Fn(&JobUpdate) + Send + Sync + 'static,
    {
        self.shared.notifier.on_event(callback);
    }

    /// Receive job updates through a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobUpdate> {
        self.shared.notifier.subscribe()
    }

    /// State of a job that has not yet reached a terminal state.
    ///
    /// Terminal jobs are retired; their final state is available from their
    /// [`JobHandle`] and from the last update delivered for them.
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.shared.lock().state(id)
    }

    /// Cancel a queued job. Returns `false` once it has started.
    pub fn cancel(&self, id: JobId) -> bool {
        self.shared.cancel(id)
    }

    /// Number of jobs queued or running.
    pub fn pending_jobs(&self) -> usize {
        self.shared.lock().pending()
    }

    fn submit(
        &self,
        action: TransferAction,
        source: &Path,
        destination_dir: Option<&Path>,
    ) -> JobHandle {
        // Resolved paths make aliases of one node share a footprint.
        let spec = JobSpec::new(
            action,
            path::resolve(source),
            destination_dir.map(path::resolve_all),
        );

        let (handle, admitted) = {
            let mut scheduler = self.shared.lock();
            let (id, state_rx) = scheduler.submit(spec.clone());
            tracing::debug!(job = %id, %action, source = %spec.source.display(), "job queued");
            self.shared.publish(id, action, JobState::Queued, TransferProgress::default());
            let admitted = scheduler.admit();
            (
                JobHandle::new(id, &spec, state_rx, self.shared.clone()),
                admitted,
            )
        };

        Shared::dispatch(&self.shared, admitted);
        handle
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("pending_jobs", &self.pending_jobs())
            .field("workers", &self.shared.pool.workers())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, id: JobId, action: TransferAction, state: JobState, progress: TransferProgress) {
        self.notifier.publish(JobUpdate {
            id,
            action,
            state,
            progress,
        });
    }

    pub(crate) fn cancel(self: &Arc<Self>, id: JobId) -> bool {
        let admitted = {
            let mut scheduler = self.lock();
            let Some(action) = scheduler.cancel(id) else {
                return false;
            };
            tracing::info!(job = %id, "job cancelled");
            self.publish(id, action, JobState::Cancelled, TransferProgress::default());
            scheduler.admit()
        };

        Self::dispatch(self, admitted);
        true
    }

    /// Hand admitted jobs to the worker pool.
    fn dispatch(shared: &Arc<Self>, admitted: Vec<(JobId, JobSpec)>) {
        for (id, spec) in admitted {
            let task_shared = shared.clone();
            shared.pool.spawn(async move {
                let worker_shared = task_shared.clone();
                let outcome = task_shared
                    .pool
                    .run(move || worker_shared.run_job(id, spec))
                    .await;

                match outcome {
                    Ok(Some((state, progress))) => task_shared.complete(id, state, progress),
                    // Cancelled before a worker picked it up.
                    Ok(None) => {}
                    Err(err) => task_shared.complete(
                        id,
                        JobState::Failed(Failure::from(&err)),
                        TransferProgress::default(),
                    ),
                }
            });
        }
    }

    /// Body of a job, run on a pool worker.
    fn run_job(&self, id: JobId, spec: JobSpec) -> Option<(JobState, TransferProgress)> {
        {
            let mut scheduler = self.lock();
            let action = scheduler.start(id)?;
            tracing::debug!(job = %id, %action, "job running");
            self.publish(id, action, JobState::Running, TransferProgress::default());
        }

        let (files, bytes) = measure(&spec.source);
        let emit = |progress: &TransferProgress| {
            self.publish(id, spec.action, JobState::Running, progress.clone());
        };
        let mut tracker = ProgressTracker::new(
            TransferProgress::new(files, bytes),
            self.config.progress_interval,
            &emit,
        );

        let result = match (spec.action, spec.destination_dir.as_deref()) {
            (TransferAction::Copy, Some(dir)) => copy_job(&spec.source, dir, &mut tracker),
            (TransferAction::Move, Some(dir)) => move_job(&spec.source, dir, &mut tracker),
            (TransferAction::Delete, _) => delete_job(&spec.source, &mut tracker),
            (action, None) => Err(EngineError::invalid_target(
                &spec.source,
                format!("{action} needs a destination directory"),
            )),
        };

        let mut progress = tracker.into_progress();
        let state = match result {
            Ok(()) => {
                progress.finish();
                JobState::Succeeded
            }
            Err(err) => JobState::Failed(Failure::from(&err)),
        };
        Some((state, progress))
    }

    /// Record a terminal state and admit whatever it was blocking.
    fn complete(self: &Arc<Self>, id: JobId, state: JobState, progress: TransferProgress) {
        let admitted = {
            let mut scheduler = self.lock();
            let Some(action) = scheduler.finish(id, state.clone()) else {
                return;
            };

            match &state {
                JobState::Failed(failure) => {
                    tracing::warn!(job = %id, %action, error = %failure, "job failed");
                }
                _ => {
                    tracing::info!(
                        job = %id,
                        %action,
                        files = progress.files_completed,
                        bytes = progress.bytes_processed,
                        "job succeeded"
                    );
                }
            }

            self.publish(id, action, state, progress);
            scheduler.admit()
        };

        Self::dispatch(self, admitted);
    }
}
