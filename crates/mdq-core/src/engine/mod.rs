//! Transfer engine contract.
//!
//! The queue never speaks a download protocol itself. Each admitted job gets
//! its own [`TransferEngine`] from an [`EngineFactory`]; the job supervisor
//! starts it, polls [`TransferEngine::status`] until it reports completion,
//! and stops it on every exit path.

pub mod aria2;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::job::JobId;

/// Point-in-time status reported by an engine.
///
/// An engine that has nothing to report yet returns `None` from `status()`
/// instead of a zeroed snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSnapshot {
    pub peer_count: u32,
    /// Percent complete in [0.0, 100.0].
    pub progress: f64,
    /// Instantaneous download rate in bytes per second.
    pub rate: u64,
    /// Total payload size, once known.
    pub total_size: Option<u64>,
    pub is_downloading: bool,
    pub is_finished: bool,
    /// Display name of the payload, once the engine knows it.
    pub name: Option<String>,
}

/// Errors reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Could not reach the engine (connection refused, timeout, ...).
    #[error("transport: {0}")]
    Transport(String),
    /// Engine answered with an error for this request.
    #[error("engine rejected request: {0}")]
    Rpc(String),
    /// Engine answered with something we could not interpret.
    #[error("unexpected engine response: {0}")]
    Protocol(String),
}

/// One transfer for one identifier. Owned exclusively by its supervisor.
#[async_trait]
pub trait TransferEngine: Send {
    /// Begin transferring. Called once, right after construction.
    async fn start(&mut self) -> Result<(), EngineError>;

    /// Stop transferring. Best-effort; callers log and ignore errors.
    async fn stop(&mut self) -> Result<(), EngineError>;

    /// Current status, or `None` while the engine has nothing to report yet.
    async fn status(&mut self) -> Result<Option<EngineSnapshot>, EngineError>;

    /// Produced files, relative to the destination directory.
    async fn files(&mut self) -> Result<Vec<String>, EngineError>;
}

/// Builds engines for admitted jobs.
pub trait EngineFactory: Send + Sync {
    fn create(
        &self,
        id: &JobId,
        destination_dir: &Path,
    ) -> Result<Box<dyn TransferEngine>, EngineError>;
}
