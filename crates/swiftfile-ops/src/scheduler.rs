//! Job admission and state transitions.
//!
//! Everything here runs under the engine's single lock. Nothing in this
//! module touches the filesystem.

use std::collections::{HashMap, VecDeque};

use tokio::sync::watch;

use crate::conflict::ConflictIndex;
use crate::job::{JobId, JobSpec, JobState, TransferAction};

struct JobRecord {
    spec: JobSpec,
    state: JobState,
    /// Footprint claimed in the active index.
    admitted: bool,
    state_tx: watch::Sender<JobState>,
}

/// Queue, job table and overlap index of the engine.
///
/// A queued job is admitted when its footprint overlaps neither an admitted
/// job nor an earlier job that is still waiting, which keeps jobs of one
/// overlap group in submission order. Admitted jobs hold their claim until
/// they reach a terminal state. Terminal jobs are retired from the table.
#[derive(Default)]
pub(crate) struct Scheduler {
    next_id: u64,
    jobs: HashMap<JobId, JobRecord>,
    queue: VecDeque<JobId>,
    active: ConflictIndex,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queued job.
    pub fn submit(&mut self, spec: JobSpec) -> (JobId, watch::Receiver<JobState>) {
        self.next_id += 1;
        let id = JobId(self.next_id);
        let (state_tx, state_rx) = watch::channel(JobState::Queued);

        self.jobs.insert(
            id,
            JobRecord {
                spec,
                state: JobState::Queued,
                admitted: false,
                state_tx,
            },
        );
        self.queue.push_back(id);

        (id, state_rx)
    }

    /// Admit every queued job that no longer conflicts.
    pub fn admit(&mut self) -> Vec<(JobId, JobSpec)> {
        let mut waiting = ConflictIndex::new();
        let mut still_queued = VecDeque::with_capacity(self.queue.len());
        let mut admitted = Vec::new();

        while let Some(id) = self.queue.pop_front() {
            let Some(record) = self.jobs.get_mut(&id) else {
                continue;
            };
            let footprint = &record.spec.footprint;

            let blocker = self
                .active
                .find_overlap(footprint)
                .or_else(|| waiting.find_overlap(footprint));

            if let Some(blocker) = blocker {
                tracing::debug!(job = %id, blocked_by = %blocker, "conflict deferred");
                waiting.claim(id, footprint);
                still_queued.push_back(id);
                continue;
            }

            self.active.claim(id, footprint);
            record.admitted = true;
            admitted.push((id, record.spec.clone()));
        }

        self.queue = still_queued;
        admitted
    }

    /// Move an admitted job to running. Returns `None` if it was cancelled.
    pub fn start(&mut self, id: JobId) -> Option<TransferAction> {
        let record = self.jobs.get_mut(&id)?;
        if record.state != JobState::Queued {
            return None;
        }
        record.state = JobState::Running;
        record.state_tx.send_replace(JobState::Running);
        Some(record.spec.action)
    }

    /// Record a terminal state for a job and retire it.
    ///
    /// Running jobs may end in any terminal state. An admitted job whose
    /// worker never started can only fail, e.g. when its blocking task is
    /// dropped at runtime shutdown.
    pub fn finish(&mut self, id: JobId, state: JobState) -> Option<TransferAction> {
        let record = self.jobs.get(&id)?;
        let accepted = match record.state {
            JobState::Running => state.is_terminal(),
            JobState::Queued => record.admitted && matches!(state, JobState::Failed(_)),
            _ => false,
        };
        if !accepted {
            return None;
        }
        self.retire(id, state)
    }

    /// Cancel a job that has not started yet.
    pub fn cancel(&mut self, id: JobId) -> Option<TransferAction> {
        let record = self.jobs.get(&id)?;
        if record.state != JobState::Queued {
            return None;
        }
        self.queue.retain(|queued| *queued != id);
        self.retire(id, JobState::Cancelled)
    }

    /// Current state of a job that has not been retired.
    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(&id).map(|record| record.state.clone())
    }

    /// Number of jobs still waiting for admission.
    #[cfg(test)]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of jobs that have not reached a terminal state.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    fn retire(&mut self, id: JobId, state: JobState) -> Option<TransferAction> {
        let record = self.jobs.remove(&id)?;
        if record.admitted {
            self.active.release(id, &record.spec.footprint);
        }
        record.state_tx.send_replace(state);
        Some(record.spec.action)
    }
}
