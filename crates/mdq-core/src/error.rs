//! Error types for admission, supervision, persistence and file delivery.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;
use crate::job::JobId;

/// Errors surfaced by the queue and its supervisors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Empty or malformed identifier; rejected at submission.
    #[error("invalid identifier: {0}")]
    Admission(String),

    /// Identifier is already pending, active or completed.
    #[error("already tracked: {0}")]
    Duplicate(JobId),

    /// Engine construction or start failed. Terminal for the job; not retried.
    #[error("engine failed to start: {0}")]
    EngineStart(#[source] EngineError),

    /// Engine reported an error while the job was being monitored.
    #[error("engine failed during transfer: {0}")]
    EngineRuntime(#[source] EngineError),

    /// Writing the state file failed. In-memory state stays authoritative.
    #[error("persisting state to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested name resolves outside the destination directory.
    #[error("path escapes destination directory: {0}")]
    PathSecurity(String),

    /// Requested file does not exist (or is not a regular file).
    #[error("file not found: {0}")]
    FileNotFound(String),
}
