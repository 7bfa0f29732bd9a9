//! State shared between the queue handle, the dispatch loop and supervisors.
//!
//! Each container has its own lock and at most one is held at a time; no lock
//! is ever held across an `.await`. `tracked` indexes every identifier that is
//! pending, active or completed, so dedup is a single check-and-insert.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::engine::EngineFactory;
use crate::error::QueueError;
use crate::job::{CompletedRecord, JobId, PendingEntry};
use crate::store::{PersistedState, StateStore};
use crate::supervisor::{ActiveJob, JobOutcome, JobState};

use super::events::JobEvent;
use super::QueueSettings;

const EVENT_CAPACITY: usize = 256;

pub(crate) struct Shared {
    pub(crate) settings: QueueSettings,
    pub(crate) store: StateStore,
    pub(crate) factory: Arc<dyn EngineFactory>,

    pub(crate) pending: Mutex<VecDeque<PendingEntry>>,
    pub(crate) active: Mutex<HashMap<JobId, ActiveJob>>,
    pub(crate) completed: Mutex<Vec<CompletedRecord>>,
    pub(crate) tracked: Mutex<HashSet<JobId>>,
    /// Jobs stopped by shutdown, with their admission sequence; requeued by `drain`.
    pub(crate) interrupted: Mutex<Vec<(u64, JobId)>>,

    /// Serializes saves so an older snapshot never lands after a newer one.
    save_lock: tokio::sync::Mutex<()>,
    /// Serializes dispatch passes so capacity checks cannot race.
    pub(crate) dispatch_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<JobEvent>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) tracker: TaskTracker,
    next_seq: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        settings: QueueSettings,
        store: StateStore,
        factory: Arc<dyn EngineFactory>,
        state: PersistedState,
    ) -> Self {
        let (pending, completed, tracked) = reconcile(state);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            store,
            factory,
            pending: Mutex::new(pending),
            active: Mutex::new(HashMap::new()),
            completed: Mutex::new(completed),
            tracked: Mutex::new(tracked),
            interrupted: Mutex::new(Vec::new()),
            save_lock: tokio::sync::Mutex::new(()),
            dispatch_lock: tokio::sync::Mutex::new(()),
            events,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Pop the head of the pending queue. Only dispatch admits from here.
    pub(crate) fn dequeue(&self) -> Option<PendingEntry> {
        self.pending.lock().pop_front()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn publish_state(&self, id: &JobId, state: JobState) {
        self.publish(JobEvent::StateChanged {
            id: id.clone(),
            state,
        });
    }

    /// Run `f` on the active record for `id`, if it is still there.
    pub(crate) fn update_active<R>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut ActiveJob) -> R,
    ) -> Option<R> {
        self.active.lock().get_mut(id).map(f)
    }

    pub(crate) fn set_state(&self, id: &JobId, state: JobState) {
        if self.update_active(id, |job| job.state = state).is_some() {
            self.publish_state(id, state);
        }
    }

    /// Outcome for a supervisor whose token fired. A caller's cancel wins over
    /// a shutdown that arrived before the supervisor noticed it.
    pub(crate) fn cancellation_outcome(&self, id: &JobId) -> JobOutcome {
        let user_cancelled = self
            .update_active(id, |job| job.user_cancelled)
            .unwrap_or(false);
        if !user_cancelled && self.shutdown.is_cancelled() {
            JobOutcome::Interrupted
        } else {
            JobOutcome::Cancelled
        }
    }

    /// Terminal bookkeeping for a supervised job. Every supervisor exit path
    /// ends here: the active record is removed, the outcome is recorded and
    /// logged, and state is persisted.
    pub(crate) async fn settle(&self, id: &JobId, outcome: JobOutcome) {
        let removed = self.active.lock().remove(id);
        let seq = removed.as_ref().map_or(u64::MAX, |job| job.seq);
        if let Some(state) = outcome.state() {
            self.publish_state(id, state);
        }

        match outcome {
            JobOutcome::Finished(record) => {
                let files = record.files.len();
                self.completed.lock().push(record);
                tracing::info!(job = %id, files, "job finished");
                self.publish(JobEvent::Finished {
                    id: id.clone(),
                    files,
                });
            }
            JobOutcome::Cancelled => {
                self.tracked.lock().remove(id);
                tracing::info!(job = %id, "job cancelled by user");
                self.publish(JobEvent::Cancelled { id: id.clone() });
            }
            JobOutcome::TimedOut { idle } => {
                self.tracked.lock().remove(id);
                tracing::warn!(
                    job = %id,
                    idle_secs = idle.as_secs(),
                    "auto-cancel: no peers for longer than {}s",
                    self.settings.stall_timeout.as_secs()
                );
                self.publish(JobEvent::TimedOut {
                    id: id.clone(),
                    idle_secs: idle.as_secs(),
                });
            }
            JobOutcome::Failed(err) => {
                self.tracked.lock().remove(id);
                tracing::error!(job = %id, "job failed: {}", err);
                self.publish(JobEvent::Failed {
                    id: id.clone(),
                    reason: err.to_string(),
                });
            }
            JobOutcome::Interrupted => {
                tracing::debug!(job = %id, "job interrupted by shutdown");
                self.interrupted.lock().push((seq, id.clone()));
                // drain() requeues and saves once every supervisor is done.
                return;
            }
        }

        self.save_logged().await;
    }

    pub(crate) fn persisted_snapshot(&self) -> PersistedState {
        let pending = self.pending.lock().iter().map(|e| e.id.clone()).collect();
        let completed = self.completed.lock().clone();
        PersistedState { pending, completed }
    }

    pub(crate) async fn save(&self) -> Result<(), QueueError> {
        let _guard = self.save_lock.lock().await;
        let state = self.persisted_snapshot();
        self.store.save(&state).await
    }

    /// Save, logging (not propagating) failures: memory stays authoritative
    /// and the next save retries.
    pub(crate) async fn save_logged(&self) {
        if let Err(e) = self.save().await {
            tracing::warn!("state save failed: {}", e);
        }
    }
}

/// Build containers from a loaded snapshot, dropping repeated identifiers.
/// Completed records win over pending entries for the same identifier.
fn reconcile(
    state: PersistedState,
) -> (VecDeque<PendingEntry>, Vec<CompletedRecord>, HashSet<JobId>) {
    let mut tracked = HashSet::new();
    let mut completed = Vec::with_capacity(state.completed.len());
    for record in state.completed {
        if tracked.insert(record.id.clone()) {
            completed.push(record);
        } else {
            tracing::warn!(job = %record.id, "dropping duplicate completed record from state file");
        }
    }
    let mut pending = VecDeque::with_capacity(state.pending.len());
    for id in state.pending {
        if tracked.insert(id.clone()) {
            pending.push_back(PendingEntry::new(id));
        } else {
            tracing::warn!(job = %id, "dropping duplicate pending entry from state file");
        }
    }
    (pending, completed, tracked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::parse(s).unwrap()
    }

    #[test]
    fn reconcile_drops_duplicates() {
        let state = PersistedState {
            pending: vec![id("magnet:?xt=a"), id("magnet:?xt=b"), id("magnet:?xt=a"), id("magnet:?xt=c")],
            completed: vec![CompletedRecord {
                id: id("magnet:?xt=c"),
                files: vec![],
                created_at: 0,
            }],
        };
        let (pending, completed, tracked) = reconcile(state);
        let order: Vec<&str> = pending.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["magnet:?xt=a", "magnet:?xt=b"]);
        assert_eq!(completed.len(), 1);
        assert_eq!(tracked.len(), 3);
    }
}
