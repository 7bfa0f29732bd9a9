//! Lifecycle events published by the queue.

use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::supervisor::JobState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Queued { id: JobId, position: usize },
    RemovedFromQueue { id: JobId },
    Admitted { id: JobId },
    StateChanged { id: JobId, state: JobState },
    Finished { id: JobId, files: usize },
    Cancelled { id: JobId },
    /// Automatic cancellation by the stall rule.
    TimedOut { id: JobId, idle_secs: u64 },
    Failed { id: JobId, reason: String },
    /// Put back at the head of the queue by a graceful shutdown.
    Requeued { id: JobId },
}

impl JobEvent {
    pub fn id(&self) -> &JobId {
        match self {
            JobEvent::Queued { id, .. }
            | JobEvent::RemovedFromQueue { id }
            | JobEvent::Admitted { id }
            | JobEvent::StateChanged { id, .. }
            | JobEvent::Finished { id, .. }
            | JobEvent::Cancelled { id }
            | JobEvent::TimedOut { id, .. }
            | JobEvent::Failed { id, .. }
            | JobEvent::Requeued { id } => id,
        }
    }
}
