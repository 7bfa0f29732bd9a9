//! Job identifiers and the records kept for pending and completed jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::QueueError;

/// Upper bound on identifier length; magnet links with many trackers stay well below this.
const MAX_ID_LEN: usize = 8192;

/// Opaque, caller-supplied resource identifier (typically a magnet link).
///
/// The unique key across pending, active and completed jobs. Only constructible
/// through [`JobId::parse`], so every instance has passed admission validation
/// (or came from the state file, which only ever stores validated ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Validate a raw identifier: trimmed, non-empty, bounded, no whitespace or
    /// control characters, and an absolute URI (`scheme:...`).
    pub fn parse(raw: &str) -> Result<Self, QueueError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueueError::Admission("empty identifier".to_string()));
        }
        if trimmed.len() > MAX_ID_LEN {
            return Err(QueueError::Admission(format!(
                "identifier longer than {MAX_ID_LEN} bytes"
            )));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(QueueError::Admission(
                "identifier contains whitespace or control characters".to_string(),
            ));
        }
        url::Url::parse(trimmed)
            .map_err(|e| QueueError::Admission(format!("not a resource locator: {e}")))?;
        Ok(JobId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job waiting for admission. Position is derived from queue index, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: JobId,
    /// Unix seconds at submission (or at load time for entries restored from disk).
    pub enqueued_at: i64,
}

impl PendingEntry {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            enqueued_at: unix_timestamp(),
        }
    }
}

/// One file produced by a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedFile {
    /// Name relative to the destination directory.
    pub name: String,
    pub size: u64,
    /// Unix seconds when the file was recorded.
    pub completed_at: i64,
}

/// Durable proof that a job finished, with its produced files. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub id: JobId,
    pub files: Vec<CompletedFile>,
    pub created_at: i64,
}

pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
