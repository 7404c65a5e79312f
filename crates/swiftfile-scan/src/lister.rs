//! Asynchronous directory lister with generation supersession.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use swiftfile_core::{EngineConfig, EngineError, Entry, Failure, Notifier, WorkerPool, path};

use crate::snapshot::read_entries;

/// Identifier of one listing request, monotonically increasing per lister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of a listing, as delivered to observers.
#[derive(Debug, Clone)]
pub struct ListingResult {
    /// Request this result answers.
    pub generation: Generation,
    /// Directory that was listed.
    pub target: PathBuf,
    /// Entries found. Empty when `error` is set.
    pub entries: Vec<Entry>,
    /// Why the listing failed, if it did.
    pub error: Option<Failure>,
}

impl ListingResult {
    /// Check if the listing succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Handle returned for an issued listing request.
#[derive(Debug, Clone)]
pub struct ListingHandle {
    generation: Generation,
    target: PathBuf,
}

impl ListingHandle {
    /// Generation of this request.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Normalized directory being listed.
    pub fn target(&self) -> &Path {
        &self.target
    }
}

/// Lists directories off the caller's thread for one consumer.
///
/// A lister represents a single consumer, such as one file panel. Every call
/// to [`DirectoryLister::list`] supersedes the previous ones: their scans are
/// cancelled and any result they still produce is discarded, so observers
/// only ever see the result of the most recent request.
///
/// Several listers may share one [`WorkerPool`].
pub struct DirectoryLister {
    pool: WorkerPool,
    config: Arc<EngineConfig>,
    latest: Arc<AtomicU64>,
    in_flight: Mutex<Option<CancellationToken>>,
    notifier: Notifier<ListingResult>,
}

impl DirectoryLister {
    /// Create a lister that runs its scans on `pool`.
    pub fn new(pool: WorkerPool, config: EngineConfig) -> Self {
        let latest = Arc::new(AtomicU64::new(0));
        let gate = latest.clone();
        let notifier = Notifier::with_gate(&pool, move |result: &ListingResult| {
            result.generation.0 == gate.load(Ordering::SeqCst)
        });

        Self {
            pool,
            config: Arc::new(config),
            latest,
            in_flight: Mutex::new(None),
            notifier,
        }
    }

    /// Start listing `dir` and return immediately.
    ///
    /// Failures, including a directory that no longer exists, are delivered
    /// to observers rather than returned here.
    pub fn list(&self, dir: impl AsRef<Path>) -> ListingHandle {
        let target = path::normalize(dir.as_ref());
        let cancel = CancellationToken::new();
        let generation = self.advance(Some(cancel.clone()));

        tracing::debug!(%generation, target = %target.display(), "listing requested");

        let pool = self.pool.clone();
        let config = self.config.clone();
        let latest = self.latest.clone();
        let notifier = self.notifier.clone();
        let dir = target.clone();

        self.pool.spawn(async move {
            let scan_dir = dir.clone();
            let outcome = pool
                .run(move || read_entries(&scan_dir, &config, &cancel))
                .await
                .and_then(|r| r);

            let result = match outcome {
                Ok(entries) => ListingResult {
                    generation,
                    target: dir,
                    entries,
                    error: None,
                },
                Err(EngineError::Interrupted) => {
                    tracing::debug!(%generation, "listing cancelled");
                    return;
                }
                Err(err) => {
                    tracing::warn!(%generation, error = %err, "listing failed");
                    ListingResult {
                        generation,
                        target: dir,
                        entries: Vec::new(),
                        error: Some(Failure::from(&err)),
                    }
                }
            };

            if latest.load(Ordering::SeqCst) != generation.0 {
                tracing::debug!(%generation, "discarding superseded listing");
                return;
            }

            notifier.publish(result);
        });

        ListingHandle { generation, target }
    }

    /// Supersede any outstanding request without starting a new one.
    pub fn cancel_pending(&self) {
        self.advance(None);
    }

    /// Register a callback for listing results.
    pub fn on_result<F>(&self, callback: F)
    where
        F: Fn(&ListingResult) + Send + Sync + 'static,
    {
        self.notifier.on_event(callback);
    }

    /// Receive listing results through a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ListingResult> {
        self.notifier.subscribe()
    }

    /// Most recently issued generation.
    pub fn latest(&self) -> Generation {
        Generation(self.latest.load(Ordering::SeqCst))
    }

    /// Check if `generation` is still the most recent request.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest() == generation
    }

    fn advance(&self, next: Option<CancellationToken>) -> Generation {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = in_flight.take() {
            previous.cancel();
        }
        *in_flight = next;

        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl std::fmt::Debug for DirectoryLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryLister")
            .field("latest", &self.latest())
            .field("workers", &self.pool.workers())
            .finish()
    }
}
