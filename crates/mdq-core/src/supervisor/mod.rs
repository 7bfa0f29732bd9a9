//! Job supervisor: drives one admitted job from `Starting` to a terminal state.
//!
//! One supervisor task per active job. It constructs and starts the engine,
//! polls it every `poll_interval`, keeps the job's active record current,
//! applies the zero-peer stall timeout, and on any exit stops the engine and
//! hands a [`JobOutcome`] to the queue, which removes the record and persists.

mod eta;
mod finish;
mod record;
mod stall;
mod state;

pub use eta::{compute_eta, format_bytes, format_eta, format_rate};
pub(crate) use record::ActiveJob;
pub use record::ActiveJobView;
pub use stall::{StallCheck, StallTimer};
pub use state::JobState;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineError, TransferEngine};
use crate::error::QueueError;
use crate::job::{CompletedRecord, JobId};
use crate::queue::Shared;

/// How a supervised job ended.
#[derive(Debug)]
pub(crate) enum JobOutcome {
    Finished(CompletedRecord),
    /// Cancelled by a caller.
    Cancelled,
    /// Auto-cancelled by the stall rule after `idle` without peers.
    TimedOut { idle: Duration },
    Failed(QueueError),
    /// Stopped because the queue is shutting down; the job is requeued.
    Interrupted,
}

impl JobOutcome {
    pub(crate) fn state(&self) -> Option<JobState> {
        match self {
            JobOutcome::Finished(_) => Some(JobState::Finished),
            JobOutcome::Cancelled => Some(JobState::Cancelled),
            JobOutcome::TimedOut { .. } => Some(JobState::TimedOut),
            JobOutcome::Failed(_) => Some(JobState::Failed),
            JobOutcome::Interrupted => None,
        }
    }
}

/// Spawn the supervisor for an already-admitted job on the queue's task tracker.
///
/// The job itself runs in its own task so that a panic inside an engine still
/// ends in `settle` (as a failure) instead of leaving an orphaned record.
pub(crate) fn spawn(shared: &Arc<Shared>, id: JobId, cancel: CancellationToken) {
    let shared_task = Arc::clone(shared);
    shared.tracker.spawn(async move {
        let job = tokio::spawn(supervise(Arc::clone(&shared_task), id.clone(), cancel));
        let outcome = match job.await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(QueueError::EngineRuntime(EngineError::Protocol(
                format!("supervisor task ended abnormally: {e}"),
            ))),
        };
        shared_task.settle(&id, outcome).await;
    });
}

async fn supervise(shared: Arc<Shared>, id: JobId, cancel: CancellationToken) -> JobOutcome {
    let mut engine = match shared.factory.create(&id, &shared.settings.destination_dir) {
        Ok(engine) => engine,
        Err(e) => return JobOutcome::Failed(QueueError::EngineStart(e)),
    };
    if let Err(e) = engine.start().await {
        return JobOutcome::Failed(QueueError::EngineStart(e));
    }
    shared.set_state(&id, JobState::Connecting);
    tracing::debug!(job = %id, "engine started");

    let outcome = monitor(&shared, &id, engine.as_mut(), &cancel).await;

    if let Err(e) = engine.stop().await {
        tracing::warn!(job = %id, "engine stop failed (ignored): {}", e);
    }
    outcome
}

async fn monitor(
    shared: &Shared,
    id: &JobId,
    engine: &mut dyn TransferEngine,
    cancel: &CancellationToken,
) -> JobOutcome {
    let settings = &shared.settings;
    let mut stall = StallTimer::new(settings.stall_timeout, Instant::now());

    loop {
        if cancel.is_cancelled() {
            return shared.cancellation_outcome(id);
        }

        let snapshot = match engine.status().await {
            Ok(s) => s,
            Err(e) => return JobOutcome::Failed(QueueError::EngineRuntime(e)),
        };

        let now = Instant::now();
        let check = match snapshot.as_ref() {
            Some(s) => stall.observe(s.peer_count, now),
            None => {
                stall.hold(now);
                StallCheck::Healthy
            }
        };
        let last_seen = stall.last_seen_peers();
        let changed = shared.update_active(id, |job| {
            let before = job.state;
            job.apply(snapshot.as_ref(), last_seen);
            (before != job.state).then_some(job.state)
        });
        if let Some(Some(state)) = changed {
            shared.publish_state(id, state);
        }

        if snapshot.as_ref().is_some_and(|s| s.is_finished) {
            return match engine.files().await {
                Ok(names) => JobOutcome::Finished(
                    finish::completed_record(id, &settings.destination_dir, &names).await,
                ),
                Err(e) => JobOutcome::Failed(QueueError::EngineRuntime(e)),
            };
        }

        if let StallCheck::Stalled(idle) = check {
            return JobOutcome::TimedOut { idle };
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }
}
