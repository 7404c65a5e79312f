//! Core types and runtime plumbing for swiftfile.
//!
//! This crate provides the value types shared by the lister and the
//! transfer engine (entries, errors, configuration) together with the two
//! pieces of runtime machinery both of them sit on: a bounded worker pool
//! for blocking filesystem work and a notifier that delivers results to
//! registered observers from a single task.

mod config;
mod entry;
mod error;
mod notify;
pub mod path;
mod pool;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use entry::{Entry, EntryKind};
pub use error::{EngineError, Failure, FailureKind};
pub use notify::{Callback, Notifier};
pub use pool::WorkerPool;

/// Default number of workers in the shared pool.
pub const DEFAULT_WORKERS: usize = 8;
