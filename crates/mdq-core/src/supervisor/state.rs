//! Job lifecycle states.

use serde::{Deserialize, Serialize};

/// `Starting -> Connecting -> Transferring -> {Finished | Cancelled | TimedOut | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Starting,
    Connecting,
    Transferring,
    Finished,
    Cancelled,
    TimedOut,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Starting => "starting",
            JobState::Connecting => "connecting",
            JobState::Transferring => "transferring",
            JobState::Finished => "finished",
            JobState::Cancelled => "cancelled",
            JobState::TimedOut => "timed_out",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Cancelled | JobState::TimedOut | JobState::Failed
        )
    }
}
