//! Admission queue: FIFO pending jobs, capped admission, dedup, persistence.
//!
//! [`DownloadQueue`] is the single handle callers use. It is a cheap clone over
//! shared state; the dispatch loop, the autosave loop and one supervisor task
//! per active job all work through the same [`Shared`].

mod dispatch;
mod events;
mod shared;
mod status;

pub use events::JobEvent;
pub use status::{PendingView, QueueStatus};
pub(crate) use shared::Shared;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::MdqConfig;
use crate::engine::EngineFactory;
use crate::error::QueueError;
use crate::job::{JobId, PendingEntry};
use crate::paths;
use crate::store::StateStore;

/// Runtime knobs for the queue, resolved from [`MdqConfig`].
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub destination_dir: PathBuf,
    pub max_active: usize,
    pub stall_timeout: Duration,
    pub dispatch_interval: Duration,
    pub poll_interval: Duration,
    pub autosave_interval: Duration,
}

impl QueueSettings {
    pub fn from_config(cfg: &MdqConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            destination_dir: cfg.resolve_destination_dir()?,
            max_active: cfg.max_active,
            stall_timeout: cfg.stall_timeout(),
            dispatch_interval: cfg.dispatch_interval(),
            poll_interval: cfg.poll_interval(),
            autosave_interval: cfg.autosave_interval(),
        })
    }
}

/// Result of [`DownloadQueue::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    RemovedFromQueue,
    /// The supervisor was signalled; it stops the engine and removes the record.
    RemovedFromActive,
    NotFound,
}

#[derive(Clone)]
pub struct DownloadQueue {
    shared: Arc<Shared>,
}

impl DownloadQueue {
    /// Create the destination directory, load persisted state and build the queue.
    /// Nothing is admitted until [`run`](Self::run) or [`dispatch_once`](Self::dispatch_once).
    pub fn open(
        mut settings: QueueSettings,
        store: StateStore,
        factory: Arc<dyn EngineFactory>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&settings.destination_dir).with_context(|| {
            format!(
                "create destination directory {}",
                settings.destination_dir.display()
            )
        })?;
        settings.destination_dir = settings
            .destination_dir
            .canonicalize()
            .with_context(|| format!("resolve {}", settings.destination_dir.display()))?;

        let state = store.load();
        tracing::info!(
            destination = %settings.destination_dir.display(),
            state_file = %store.path().display(),
            max_active = settings.max_active,
            "queue opened"
        );
        Ok(Self {
            shared: Arc::new(Shared::new(settings, store, factory, state)),
        })
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Validate and enqueue `raw`, returning its 1-based position.
    pub async fn submit(&self, raw: &str) -> Result<usize, QueueError> {
        let id = JobId::parse(raw)?;
        if self.shared.shutdown.is_cancelled() {
            return Err(QueueError::Admission("queue is shutting down".to_string()));
        }
        if !self.shared.tracked.lock().insert(id.clone()) {
            tracing::debug!(job = %id, "duplicate submission");
            return Err(QueueError::Duplicate(id));
        }
        let position = {
            let mut pending = self.shared.pending.lock();
            pending.push_back(PendingEntry::new(id.clone()));
            pending.len()
        };
        tracing::info!(job = %id, position, "queued");
        self.shared.publish(JobEvent::Queued { id, position });
        self.shared.save_logged().await;
        Ok(position)
    }

    /// Cancel a pending or active job. Never waits for engine teardown.
    pub async fn cancel(&self, raw: &str) -> CancelOutcome {
        let Ok(id) = JobId::parse(raw) else {
            return CancelOutcome::NotFound;
        };

        let removed = {
            let mut pending = self.shared.pending.lock();
            match pending.iter().position(|e| e.id == id) {
                Some(index) => pending.remove(index),
                None => None,
            }
        };
        if removed.is_some() {
            self.shared.tracked.lock().remove(&id);
            tracing::info!(job = %id, "removed from queue");
            self.shared.publish(JobEvent::RemovedFromQueue { id });
            self.shared.save_logged().await;
            return CancelOutcome::RemovedFromQueue;
        }

        let signalled = self.shared.update_active(&id, |job| {
            if job.user_cancelled {
                return false;
            }
            job.user_cancelled = true;
            job.cancel.cancel();
            true
        });
        if signalled == Some(true) {
            tracing::info!(job = %id, "cancel requested for active job");
            CancelOutcome::RemovedFromActive
        } else {
            CancelOutcome::NotFound
        }
    }

    pub fn status(&self) -> QueueStatus {
        status::collect(&self.shared)
    }

    /// Open a file from the destination directory for reading.
    pub async fn fetch_file(&self, name: &str) -> Result<(PathBuf, tokio::fs::File), QueueError> {
        paths::open_within(&self.shared.settings.destination_dir, name).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.subscribe()
    }

    /// One admission pass. Returns the number of jobs admitted.
    pub async fn dispatch_once(&self) -> usize {
        dispatch::dispatch_once(&self.shared).await
    }

    /// Run the dispatch and autosave loops until [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        let autosave = tokio::spawn(dispatch::run_autosave_loop(Arc::clone(&self.shared)));
        dispatch::run_dispatch_loop(Arc::clone(&self.shared)).await;
        if let Err(e) = autosave.await {
            tracing::warn!("autosave task ended abnormally: {}", e);
        }
    }

    /// Stop dispatching, interrupt every active job, requeue them at the head
    /// in admission order and save. Returns once all supervisors have exited.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down queue");
        dispatch::drain(&self.shared).await;
    }

    /// Write the current state to disk now.
    pub async fn save(&self) -> Result<(), QueueError> {
        self.shared.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, TransferEngine};
    use std::path::Path;

    struct NoEngine;

    impl EngineFactory for NoEngine {
        fn create(
            &self,
            _id: &JobId,
            _destination_dir: &Path,
        ) -> Result<Box<dyn TransferEngine>, EngineError> {
            Err(EngineError::Transport("no engine in unit tests".to_string()))
        }
    }

    fn open(dir: &Path) -> DownloadQueue {
        let settings = QueueSettings {
            destination_dir: dir.join("downloads"),
            max_active: 1,
            stall_timeout: Duration::from_secs(120),
            dispatch_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(10),
        };
        DownloadQueue::open(settings, StateStore::new(dir.join("state.json")), Arc::new(NoEngine))
            .unwrap()
    }

    #[tokio::test]
    async fn submit_positions_and_dequeue_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let q = open(dir.path());
        assert_eq!(q.submit("magnet:?xt=a").await.unwrap(), 1);
        assert_eq!(q.submit("  magnet:?xt=b  ").await.unwrap(), 2);
        assert_eq!(q.shared.dequeue().unwrap().id.as_str(), "magnet:?xt=a");
        assert_eq!(q.shared.dequeue().unwrap().id.as_str(), "magnet:?xt=b");
        assert!(q.shared.dequeue().is_none());
    }

    #[tokio::test]
    async fn submit_rejects_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let q = open(dir.path());
        for raw in ["", "   ", "not a link", "no-scheme"] {
            assert!(
                matches!(q.submit(raw).await, Err(QueueError::Admission(_))),
                "{raw:?} should be rejected"
            );
        }
        assert!(q.status().pending.is_empty());
    }

    #[tokio::test]
    async fn cancel_pending_allows_resubmit() {
        let dir = tempfile::tempdir().unwrap();
        let q = open(dir.path());
        q.submit("magnet:?xt=a").await.unwrap();
        assert!(matches!(
            q.submit("magnet:?xt=a").await,
            Err(QueueError::Duplicate(_))
        ));
        assert_eq!(q.cancel("magnet:?xt=a").await, CancelOutcome::RemovedFromQueue);
        assert_eq!(q.cancel("magnet:?xt=a").await, CancelOutcome::NotFound);
        assert_eq!(q.submit("magnet:?xt=a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn destination_is_created_and_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let q = open(dir.path());
        assert!(q.settings().destination_dir.is_dir());
        assert!(q.settings().destination_dir.is_absolute());
    }
}
