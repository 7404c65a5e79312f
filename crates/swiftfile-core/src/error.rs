//! Error types for listing and transfer operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the lister and the transfer engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Target vanished before the operation ran.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Recursive delete left some paths behind.
    #[error("Could not remove {remaining} item(s) under {path}: {reason}")]
    NotEmptyOrPermission {
        path: PathBuf,
        remaining: usize,
        reason: String,
    },

    /// Source and destination do not form a valid transfer.
    #[error("Invalid target {path}: {message}")]
    InvalidTarget { path: PathBuf, message: String },

    /// Generic I/O error (disk full, device error, path too long...).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation was cancelled before it finished.
    #[error("Operation interrupted")]
    Interrupted,

    /// No tokio runtime was available to host the worker pool.
    #[error("No async runtime available: {message}")]
    NoRuntime { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl EngineError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an invalid target error.
    pub fn invalid_target(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error for observers.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::NotADirectory { .. } => FailureKind::NotADirectory,
            Self::NotEmptyOrPermission { .. } => FailureKind::NotEmptyOrPermission,
            Self::InvalidTarget { .. } | Self::InvalidConfig { .. } => FailureKind::InvalidTarget,
            Self::Interrupted => FailureKind::Interrupted,
            Self::Io { .. } | Self::NoRuntime { .. } | Self::Other { .. } => FailureKind::Io,
        }
    }

    /// The path this error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::NotADirectory { path }
            | Self::NotEmptyOrPermission { path, .. }
            | Self::InvalidTarget { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::Interrupted
            | Self::NoRuntime { .. }
            | Self::InvalidConfig { .. }
            | Self::Other { .. } => None,
        }
    }
}

/// Category of a delivered failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    NotFound,
    PermissionDenied,
    NotADirectory,
    NotEmptyOrPermission,
    InvalidTarget,
    Io,
    Interrupted,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "Not found"),
            Self::PermissionDenied => write!(f, "Permission denied"),
            Self::NotADirectory => write!(f, "Not a directory"),
            Self::NotEmptyOrPermission => write!(f, "Not empty or permission denied"),
            Self::InvalidTarget => write!(f, "Invalid target"),
            Self::Io => write!(f, "I/O error"),
            Self::Interrupted => write!(f, "Interrupted"),
        }
    }
}

/// A failure as delivered to observers.
///
/// Unlike [`EngineError`] this is `Clone`, so one failure can be handed to
/// every registered observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Category of the failure.
    pub kind: FailureKind,
    /// The path that caused it.
    pub path: PathBuf,
    /// A human-readable message.
    pub message: String,
}

impl Failure {
    /// Create a new failure.
    pub fn new(kind: FailureKind, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<&EngineError> for Failure {
    fn from(err: &EngineError) -> Self {
        Self {
            kind: err.kind(),
            path: err.path().cloned().unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for Failure {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
