//! Durable snapshot of the pending queue and completed records (JSON).
//!
//! Saves go to a temp file in the same directory and are renamed over the
//! state file, so a reader never observes a half-written snapshot.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::QueueError;
use crate::job::{CompletedRecord, JobId};

/// On-disk layout: `{"pending": [...], "completed": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub pending: Vec<JobId>,
    #[serde(default)]
    pub completed: Vec<CompletedRecord>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing, unreadable or corrupt file yields an empty
    /// state; the problem is logged and never fatal.
    pub fn load(&self) -> PersistedState {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file; starting empty");
                return PersistedState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "could not read state file: {}", e);
                return PersistedState::default();
            }
        };
        match serde_json::from_slice::<PersistedState>(&bytes) {
            Ok(state) => {
                tracing::info!(
                    path = %self.path.display(),
                    pending = state.pending.len(),
                    completed = state.completed.len(),
                    "loaded state"
                );
                state
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "corrupt state file ignored: {}", e);
                PersistedState::default()
            }
        }
    }

    /// Atomically replace the state file with `state`.
    pub async fn save(&self, state: &PersistedState) -> Result<(), QueueError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(|e| self.persist_err(e.into()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| self.persist_err(io::Error::new(io::ErrorKind::Other, e)))?
            .map_err(|e| self.persist_err(e))
    }

    fn persist_err(&self, source: io::Error) -> QueueError {
        QueueError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
