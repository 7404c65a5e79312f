//! Bounded pool of blocking workers.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::{EngineConfig, EngineError};

/// A fixed-size pool that runs blocking filesystem work off the caller's
/// thread.
///
/// Submission never blocks: work is handed to the runtime immediately and
/// waits inside the pool for one of `workers` slots before it starts. The
/// pool is cheap to clone; clones share the same slots, so a lister and a
/// transfer engine built from one pool compete for the same workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with `workers` slots on the current tokio runtime.
    pub fn new(workers: usize) -> Result<Self, EngineError> {
        if workers == 0 {
            return Err(EngineError::InvalidConfig {
                message: "worker pool needs at least one worker".to_string(),
            });
        }

        let handle = Handle::try_current().map_err(|e| EngineError::NoRuntime {
            message: e.to_string(),
        })?;

        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        })
    }

    /// Create a pool sized from an engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::new(config.workers)
    }

    /// Number of worker slots.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of currently free worker slots.
    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawn a coordinating task on the pool's runtime.
    ///
    /// The task itself should stay light and hand blocking work to
    /// [`WorkerPool::run`].
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run blocking work once a worker slot is free.
    pub async fn run<F, T>(&self, work: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Other {
                message: format!("Worker pool closed: {e}"),
            })?;

        self.handle
            .spawn_blocking(work)
            .await
            .map_err(|e| EngineError::Other {
                message: format!("Task failed: {e}"),
            })
    }
}
