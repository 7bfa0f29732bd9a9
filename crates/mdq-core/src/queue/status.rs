//! Read-only status view over pending, active and completed jobs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::time::Instant;

use crate::job::{CompletedRecord, JobId, PendingEntry};
use crate::supervisor::ActiveJobView;

use super::shared::Shared;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingView {
    pub id: JobId,
    /// 1-based queue position.
    pub position: usize,
    pub enqueued_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: Vec<PendingView>,
    /// In admission order.
    pub active: Vec<ActiveJobView>,
    pub completed: Vec<CompletedRecord>,
    pub destination_dir: PathBuf,
}

/// Clone each container under its own lock, one at a time.
///
/// The three reads are not one atomic snapshot. An id caught mid-transition
/// (popped for admission, or finishing) can show up in two reads; it is
/// reported only in the later container: active over pending, completed over
/// active.
pub(crate) fn collect(shared: &Shared) -> QueueStatus {
    let pending: Vec<PendingEntry> = shared.pending.lock().iter().cloned().collect();

    let now = Instant::now();
    let mut active: Vec<(u64, ActiveJobView)> = shared
        .active
        .lock()
        .values()
        .map(|job| (job.seq, job.view(now)))
        .collect();
    active.sort_by_key(|(seq, _)| *seq);

    let completed = shared.completed.lock().clone();

    let finished: HashSet<&JobId> = completed.iter().map(|c| &c.id).collect();
    let active: Vec<ActiveJobView> = active
        .into_iter()
        .map(|(_, view)| view)
        .filter(|view| !finished.contains(&view.id))
        .collect();
    let admitted: HashSet<&JobId> = active.iter().map(|a| &a.id).collect();
    let pending = pending
        .into_iter()
        .filter(|e| !admitted.contains(&e.id) && !finished.contains(&e.id))
        .enumerate()
        .map(|(i, e)| PendingView {
            id: e.id,
            position: i + 1,
            enqueued_at: e.enqueued_at,
        })
        .collect();

    QueueStatus {
        pending,
        active,
        completed,
        destination_dir: shared.settings.destination_dir.clone(),
    }
}
