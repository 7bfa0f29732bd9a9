//! Scripted transfer engine: each identifier follows a [`Plan`] of status
//! snapshots, and the factory keeps a log of starts, stops and concurrency.

use async_trait::async_trait;
use mdq_core::engine::{EngineError, EngineFactory, EngineSnapshot, TransferEngine};
use mdq_core::job::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What one engine does. Snapshots are returned one per poll; the last repeats.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub fail_create: bool,
    pub fail_start: bool,
    /// How long `start` takes before it returns.
    pub start_delay: Option<Duration>,
    pub snapshots: Vec<Option<EngineSnapshot>>,
    /// Poll index (0-based) at which `status` returns an error.
    pub fail_status_at: Option<usize>,
    /// Files written into the destination directory on start: (name, size).
    pub write_files: Vec<(String, usize)>,
    /// Names reported by `files()`.
    pub files: Vec<String>,
}

pub fn peers(n: u32) -> Option<EngineSnapshot> {
    Some(EngineSnapshot {
        peer_count: n,
        progress: 10.0,
        rate: if n > 0 { 1024 } else { 0 },
        total_size: Some(1 << 20),
        is_downloading: true,
        is_finished: false,
        name: None,
    })
}

pub fn finished() -> Option<EngineSnapshot> {
    Some(EngineSnapshot {
        peer_count: 1,
        progress: 100.0,
        rate: 0,
        total_size: Some(100),
        is_downloading: false,
        is_finished: true,
        name: Some("a.iso".to_string()),
    })
}

impl Plan {
    /// Transfers forever with peers until stopped.
    pub fn endless() -> Self {
        Self {
            snapshots: vec![peers(3)],
            ..Self::default()
        }
    }

    /// Zero peers on every poll.
    pub fn stalled() -> Self {
        Self {
            snapshots: vec![peers(0)],
            ..Self::default()
        }
    }

    /// `polls` healthy polls, then finished with one 100-byte `a.iso`.
    pub fn finish_after(polls: usize) -> Self {
        let mut snapshots = vec![peers(2); polls];
        snapshots.push(finished());
        Self {
            snapshots,
            write_files: vec![("a.iso".to_string(), 100)],
            files: vec!["a.iso".to_string()],
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Log {
    pub started: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Log {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    /// Highest number of engines started and not yet stopped at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct MockFactory {
    plans: Mutex<HashMap<String, Plan>>,
    default_plan: Plan,
    pub log: Arc<Log>,
}

impl MockFactory {
    /// Every identifier without its own plan follows `default_plan`.
    pub fn new(default_plan: Plan) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(HashMap::new()),
            default_plan,
            log: Arc::new(Log::default()),
        })
    }

    pub fn plan(&self, id: &str, plan: Plan) {
        self.plans.lock().insert(id.to_string(), plan);
    }
}

impl EngineFactory for MockFactory {
    fn create(
        &self,
        id: &JobId,
        destination_dir: &Path,
    ) -> Result<Box<dyn TransferEngine>, EngineError> {
        let plan = self
            .plans
            .lock()
            .get(id.as_str())
            .cloned()
            .unwrap_or_else(|| self.default_plan.clone());
        if plan.fail_create {
            return Err(EngineError::Transport("engine unreachable".to_string()));
        }
        Ok(Box::new(MockEngine {
            id: id.as_str().to_string(),
            dir: destination_dir.to_path_buf(),
            plan,
            polls: 0,
            running: false,
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockEngine {
    id: String,
    dir: PathBuf,
    plan: Plan,
    polls: usize,
    running: bool,
    log: Arc<Log>,
}

#[async_trait]
impl TransferEngine for MockEngine {
    async fn start(&mut self) -> Result<(), EngineError> {
        if let Some(delay) = self.plan.start_delay {
            tokio::time::sleep(delay).await;
        }
        if self.plan.fail_start {
            return Err(EngineError::Rpc("addUri refused".to_string()));
        }
        for (name, size) in &self.plan.write_files {
            std::fs::write(self.dir.join(name), vec![0u8; *size])
                .map_err(|e| EngineError::Transport(e.to_string()))?;
        }
        self.running = true;
        self.log.started.lock().push(self.id.clone());
        let now = self.log.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.peak.fetch_max(now, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        if self.running {
            self.running = false;
            self.log.running.fetch_sub(1, Ordering::SeqCst);
        }
        self.log.stopped.lock().push(self.id.clone());
        Ok(())
    }

    async fn status(&mut self) -> Result<Option<EngineSnapshot>, EngineError> {
        let index = self.polls;
        self.polls += 1;
        if self.plan.fail_status_at == Some(index) {
            return Err(EngineError::Rpc("download removed".to_string()));
        }
        let snapshot = self
            .plan
            .snapshots
            .get(index)
            .or_else(|| self.plan.snapshots.last())
            .cloned()
            .flatten();
        Ok(snapshot)
    }

    async fn files(&mut self) -> Result<Vec<String>, EngineError> {
        Ok(self.plan.files.clone())
    }
}
