//! Transfer job types.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::watch;

use swiftfile_core::Failure;

use crate::engine::Shared;
use crate::progress::TransferProgress;

/// Unique identifier of a job, assigned in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum TransferAction {
    Copy,
    Move,
    Delete,
}

/// Lifecycle state of a job.
///
/// Transitions only move forward:
/// `Queued -> Running -> Succeeded | Failed`, or `Queued -> Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed(Failure),
    Cancelled,
}

impl JobState {
    /// Check if no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }

    /// The failure, if the job failed.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Notification sent to observers on every state change and, while a job
/// runs, on throttled progress.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    /// The job this update is about.
    pub id: JobId,
    /// What the job does.
    pub action: TransferAction,
    /// State after the change.
    pub state: JobState,
    /// Progress so far.
    pub progress: TransferProgress,
}

impl JobUpdate {
    /// The failure, if the job failed.
    pub fn error(&self) -> Option<&Failure> {
        self.state.failure()
    }
}

/// What a job operates on, fixed at submission.
#[derive(Debug, Clone)]
pub(crate) struct JobSpec {
    pub action: TransferAction,
    pub source: PathBuf,
    /// Directory receiving the source; `None` for deletes.
    pub destination_dir: Option<PathBuf>,
    /// Paths the job may touch. Two jobs with overlapping footprints never
    /// run at the same time.
    pub footprint: Vec<PathBuf>,
}

impl JobSpec {
    pub fn new(action: TransferAction, source: PathBuf, destination_dir: Option<PathBuf>) -> Self {
        let mut footprint = vec![source.clone()];
        if let Some(dir) = &destination_dir {
            footprint.push(match source.file_name() {
                Some(name) => dir.join(name),
                None => dir.clone(),
            });
        }

        Self {
            action,
            source,
            destination_dir,
            footprint,
        }
    }
}

/// Caller-side handle to a submitted job.
///
/// The handle only observes the job; the engine owns its state.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    action: TransferAction,
    source: PathBuf,
    state: watch::Receiver<JobState>,
    shared: Arc<Shared>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        spec: &JobSpec,
        state: watch::Receiver<JobState>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            action: spec.action,
            source: spec.source.clone(),
            state,
            shared,
        }
    }

    /// Job identifier.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// What the job does.
    pub fn action(&self) -> TransferAction {
        self.action
    }

    /// Source path, with symlinked parent directories resolved.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Cancel the job. Only succeeds while it is still queued.
    pub fn cancel(&self) -> bool {
        self.shared.cancel(self.id)
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait(&self) -> JobState {
        let mut state = self.state.clone();
        if let Ok(terminal) = state.wait_for(JobState::is_terminal).await {
            return (*terminal).clone();
        }
        // The engine dropped the sender; the last value is final.
        state.borrow().clone()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("source", &self.source)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        let failed = JobState::Failed(Failure::new(
            swiftfile_core::FailureKind::Io,
            "/x",
            "disk full",
        ));
        assert!(failed.is_terminal());
        assert_eq!(failed.failure().map(|f| f.message.as_str()), Some("disk full"));
    }

    #[test]
    fn test_footprint_includes_target() {
        let spec = JobSpec::new(
            TransferAction::Copy,
            PathBuf::from("/a/file.txt"),
            Some(PathBuf::from("/b")),
        );
        assert_eq!(
            spec.footprint,
            vec![PathBuf::from("/a/file.txt"), PathBuf::from("/b/file.txt")]
        );

        let delete = JobSpec::new(TransferAction::Delete, PathBuf::from("/a"), None);
        assert_eq!(delete.footprint, vec![PathBuf::from("/a")]);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(TransferAction::Move.to_string(), "move");
    }
}
