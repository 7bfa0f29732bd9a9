//! Dispatch: admit pending jobs while capacity allows, plus the background
//! dispatch/autosave loops and the shutdown drain.

use std::sync::Arc;

use crate::job::PendingEntry;
use crate::supervisor::{self, ActiveJob};

use super::events::JobEvent;
use super::shared::Shared;

/// Admit jobs from the head of the queue until it is empty or `max_active`
/// jobs are running. Returns how many were admitted.
///
/// Only this function inserts into the active map, and passes are serialized,
/// so the capacity check cannot be overtaken by another admission.
pub(crate) async fn dispatch_once(shared: &Arc<Shared>) -> usize {
    let mut admitted = 0;
    {
        let _pass = shared.dispatch_lock.lock().await;
        let max_active = shared.settings.max_active;
        while !shared.shutdown.is_cancelled() {
            if shared.active.lock().len() >= max_active {
                break;
            }
            let Some(entry) = shared.dequeue() else {
                break;
            };
            let id = entry.id;
            let cancel = shared.shutdown.child_token();
            let job = ActiveJob::new(id.clone(), shared.next_seq(), cancel.clone());
            shared.active.lock().insert(id.clone(), job);

            tracing::info!(job = %id, "admitted");
            shared.publish(JobEvent::Admitted { id: id.clone() });
            supervisor::spawn(shared, id, cancel);
            admitted += 1;
        }
    }
    if admitted > 0 {
        shared.save_logged().await;
    }
    admitted
}

pub(crate) async fn run_dispatch_loop(shared: Arc<Shared>) {
    loop {
        dispatch_once(&shared).await;
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = tokio::time::sleep(shared.settings.dispatch_interval) => {}
        }
    }
    tracing::debug!("dispatch loop stopped");
}

/// Safety-net save on a fixed interval, in case an explicit save failed.
pub(crate) async fn run_autosave_loop(shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = tokio::time::sleep(shared.settings.autosave_interval) => {
                shared.save_logged().await;
            }
        }
    }
}

/// Stop every supervisor, put interrupted jobs back at the head of the queue
/// in their admission order, and save.
pub(crate) async fn drain(shared: &Shared) {
    shared.shutdown.cancel();
    shared.tracker.close();
    shared.tracker.wait().await;

    let mut interrupted = std::mem::take(&mut *shared.interrupted.lock());
    interrupted.sort();
    {
        let mut pending = shared.pending.lock();
        for (_, id) in interrupted.iter().rev() {
            pending.push_front(PendingEntry::new(id.clone()));
        }
    }
    for (_, id) in interrupted {
        tracing::info!(job = %id, "requeued after shutdown");
        shared.publish(JobEvent::Requeued { id });
    }
    shared.save_logged().await;
}
