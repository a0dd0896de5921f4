//! Error types for the analysis pipeline.
//!
//! Malformed inputs (raw results, assertion files, history documents) are
//! recovered where they are read and never surface here.

use std::path::PathBuf;

/// Failure to enumerate the results root.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read results directory {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

/// A user-supplied path that does not stay inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathSafetyError {
    #[error("path must not be empty")]
    Empty,

    #[error("path '{0}' is absolute; expected a path relative to the workspace")]
    Absolute(String),

    #[error("path '{0}' carries a drive letter; expected a path relative to the workspace")]
    DriveLetter(String),

    #[error("path '{0}' contains '..'; path traversal is not allowed")]
    Traversal(String),
}

/// History persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Every lock attempt found a live lock owned by someone else.
    #[error("history lock {} is held by another process{}", .path.display(), holder_suffix(.holder))]
    LockHeld {
        path: PathBuf,
        holder: Option<String>,
    },

    #[error("history I/O error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("failed to serialize history: {message}")]
    Serialize { message: String },
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(pid) => format!(" (pid {})", pid),
        None => String::new(),
    }
}

impl HistoryError {
    pub fn is_lock_held(&self) -> bool {
        matches!(self, Self::LockHeld { .. })
    }
}

/// Invalid report configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("unsafe {field} path: {source}")]
    UnsafePath {
        field: &'static str,
        #[source]
        source: PathSafetyError,
    },
}

/// Errors that abort a report cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Artifacts(#[from] ArtifactError),

    #[error("failed to write outputs to {}: {message}", .path.display())]
    Output { path: PathBuf, message: String },
}

pub type HistoryResult<T> = Result<T, HistoryError>;
