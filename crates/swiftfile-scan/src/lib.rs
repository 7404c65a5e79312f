//! Asynchronous directory listing for swiftfile.
//!
//! # Overview
//!
//! [`DirectoryLister`] enumerates the immediate children of a directory on
//! a shared [`WorkerPool`] and delivers an [`Entry`] snapshot to observers.
//! Re-selecting a directory before the previous listing finishes supersedes
//! it: only the most recent request's result is ever delivered.
//!
//! # Example
//!
//! ```rust,no_run
//! use swiftfile_scan::{DirectoryLister, EngineConfig, WorkerPool};
//!
//! # async fn demo() -> Result<(), swiftfile_scan::EngineError> {
//! let config = EngineConfig::default();
//! let pool = WorkerPool::from_config(&config)?;
//! let lister = DirectoryLister::new(pool, config);
//! let mut results = lister.subscribe();
//!
//! lister.list("/tmp");
//! if let Some(result) = results.recv().await {
//!     for entry in &result.entries {
//!         println!("{} ({} bytes)", entry.name, entry.size);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod lister;
mod snapshot;

pub use lister::{DirectoryLister, Generation, ListingHandle, ListingResult};
pub use snapshot::{read_entries, sort_entries};

// Re-export core types for convenience
pub use swiftfile_core::{
    EngineConfig, EngineError, Entry, EntryKind, Failure, FailureKind, WorkerPool,
};
