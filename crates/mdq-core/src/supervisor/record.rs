//! Active job record and its read-only view.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::EngineSnapshot;
use crate::job::{unix_timestamp, JobId};

use super::eta::{compute_eta, format_eta, format_rate};
use super::state::JobState;

/// Live state of one admitted job. Lives in the queue's active map from
/// admission until its supervisor settles; only that supervisor mutates it.
#[derive(Debug)]
pub(crate) struct ActiveJob {
    pub(crate) id: JobId,
    /// Admission order, used to list and requeue jobs in FIFO order.
    pub(crate) seq: u64,
    pub(crate) state: JobState,
    pub(crate) name: Option<String>,
    pub(crate) peers: u32,
    pub(crate) progress: f64,
    pub(crate) rate: u64,
    pub(crate) eta: Option<Duration>,
    pub(crate) total_size: Option<u64>,
    pub(crate) last_seen_peers: Instant,
    pub(crate) admitted_at: i64,
    pub(crate) cancel: CancellationToken,
    /// Set when a caller cancelled the job. Takes precedence over shutdown,
    /// which fires the same token through its parent.
    pub(crate) user_cancelled: bool,
}

impl ActiveJob {
    pub(crate) fn new(id: JobId, seq: u64, cancel: CancellationToken) -> Self {
        Self {
            id,
            seq,
            state: JobState::Starting,
            name: None,
            peers: 0,
            progress: 0.0,
            rate: 0,
            eta: None,
            total_size: None,
            last_seen_peers: Instant::now(),
            admitted_at: unix_timestamp(),
            cancel,
            user_cancelled: false,
        }
    }

    /// Fold one poll result into the record. A missing snapshot leaves the
    /// transfer fields untouched; a present one moves the job to Transferring.
    pub(crate) fn apply(&mut self, snapshot: Option<&EngineSnapshot>, last_seen_peers: Instant) {
        self.last_seen_peers = last_seen_peers;
        let Some(s) = snapshot else {
            return;
        };
        if !self.state.is_terminal() {
            self.state = JobState::Transferring;
        }
        self.peers = s.peer_count;
        self.progress = if s.progress.is_finite() {
            s.progress.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.rate = s.rate;
        if s.total_size.is_some() {
            self.total_size = s.total_size;
        }
        if s.name.is_some() {
            self.name = s.name.clone();
        }
        self.eta = compute_eta(self.progress, self.rate, self.total_size);
    }

    pub(crate) fn view(&self, now: Instant) -> ActiveJobView {
        ActiveJobView {
            id: self.id.clone(),
            state: self.state,
            name: self.name.clone(),
            peers: self.peers,
            progress: (self.progress * 100.0).round() / 100.0,
            rate_bps: self.rate,
            rate: format_rate(self.rate),
            eta_secs: self.eta.map(|d| d.as_secs()),
            eta: format_eta(self.eta),
            total_size: self.total_size,
            secs_since_peers: now.saturating_duration_since(self.last_seen_peers).as_secs(),
            admitted_at: self.admitted_at,
        }
    }
}

/// Serializable snapshot of an active job for status consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJobView {
    pub id: JobId,
    pub state: JobState,
    /// Payload name reported by the engine, if known.
    pub name: Option<String>,
    pub peers: u32,
    /// Percent complete, two decimals.
    pub progress: f64,
    pub rate_bps: u64,
    /// Human-readable rate, e.g. `1.50 MiB/s`.
    pub rate: String,
    /// `None` while the estimate is unknown.
    pub eta_secs: Option<u64>,
    /// `MM:SS`, `H:MM:SS` or `unknown`.
    pub eta: String,
    pub total_size: Option<u64>,
    pub secs_since_peers: u64,
    pub admitted_at: i64,
}
