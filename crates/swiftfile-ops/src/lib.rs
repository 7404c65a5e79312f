//! File transfer engine for swiftfile.
//!
//! This crate runs copy, move and delete jobs on a shared worker pool and
//! reports their state changes and progress to observers. Jobs whose paths
//! overlap are serialized in submission order; everything else runs in
//! parallel.
//!
//! # Example
//!
//! ```rust,no_run
//! use swiftfile_ops::{JobState, TransferEngine};
//! use swiftfile_core::{EngineConfig, WorkerPool};
//!
//! # async fn demo() -> Result<(), swiftfile_core::EngineError> {
//! let config = EngineConfig::default();
//! let engine = TransferEngine::new(WorkerPool::from_config(&config)?, config);
//!
//! engine.on_job_update(|update| {
//!     println!("{} {}: {}", update.id, update.action, update.state);
//! });
//!
//! let job = engine.copy("/a/file.txt", "/b");
//! if let JobState::Failed(failure) = job.wait().await {
//!     eprintln!("copy failed: {failure}");
//! }
//! # Ok(())
//! # }
//! ```

mod conflict;
mod copy;
mod delete;
mod engine;
mod job;
mod move_op;
mod progress;
mod scheduler;

pub use conflict::{ConflictKind, check_transfer};
pub use engine::TransferEngine;
pub use job::{JobHandle, JobId, JobState, JobUpdate, TransferAction};
pub use progress::TransferProgress;
