//! Shared helpers for queue integration tests.

#![allow(dead_code)]

pub mod mock_engine;

use mdq_core::queue::{DownloadQueue, JobEvent, QueueSettings};
use mdq_core::store::StateStore;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use mock_engine::MockFactory;

/// Fast settings so real-time tests finish quickly: 10 ms polls and dispatch,
/// a 400 ms stall timeout.
pub fn settings(dir: &Path, max_active: usize) -> QueueSettings {
    QueueSettings {
        destination_dir: dir.join("downloads"),
        max_active,
        stall_timeout: Duration::from_millis(400),
        dispatch_interval: Duration::from_millis(10),
        poll_interval: Duration::from_millis(10),
        autosave_interval: Duration::from_secs(1),
    }
}

pub fn state_path(dir: &Path) -> std::path::PathBuf {
    dir.join("state.json")
}

pub fn open_queue(dir: &Path, factory: &Arc<MockFactory>, max_active: usize) -> DownloadQueue {
    open_queue_with_state(dir, &state_path(dir), factory, max_active)
}

pub fn open_queue_with_state(
    dir: &Path,
    state: &Path,
    factory: &Arc<MockFactory>,
    max_active: usize,
) -> DownloadQueue {
    let engines: Arc<dyn mdq_core::engine::EngineFactory> = factory.clone();
    DownloadQueue::open(
        settings(dir, max_active),
        StateStore::new(state.to_path_buf()),
        engines,
    )
    .expect("open queue")
}

/// Poll `cond` every 5 ms for up to 5 s.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

pub fn drain_events(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn active_ids(q: &DownloadQueue) -> Vec<String> {
    q.status()
        .active
        .into_iter()
        .map(|a| a.id.as_str().to_string())
        .collect()
}

pub fn pending_ids(q: &DownloadQueue) -> Vec<String> {
    q.status()
        .pending
        .into_iter()
        .map(|p| p.id.as_str().to_string())
        .collect()
}

pub fn completed_ids(q: &DownloadQueue) -> Vec<String> {
    q.status()
        .completed
        .into_iter()
        .map(|c| c.id.as_str().to_string())
        .collect()
}
