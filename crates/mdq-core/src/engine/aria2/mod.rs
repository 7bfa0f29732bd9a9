//! Transfer engine backed by an aria2 daemon (`aria2c --enable-rpc`).
//!
//! start → `aria2.addUri`, status → `aria2.tellStatus` (following the
//! `followedBy` gid once a magnet's metadata is fetched), stop →
//! `aria2.remove`, files → `aria2.getFiles`.

mod rpc;
mod status;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Aria2Config;
use crate::engine::{EngineError, EngineFactory, EngineSnapshot, TransferEngine};
use crate::job::JobId;

use self::rpc::RpcClient;
use self::status::{decode_files, decode_status, StatusReading, STATUS_KEYS};

/// Creates one [`Aria2Engine`] per job, all sharing the same RPC endpoint.
#[derive(Debug, Clone)]
pub struct Aria2Factory {
    client: Arc<RpcClient>,
}

impl Aria2Factory {
    pub fn new(cfg: &Aria2Config) -> Self {
        Self {
            client: Arc::new(RpcClient::new(
                cfg.rpc_url.clone(),
                cfg.rpc_secret.clone(),
                Duration::from_secs(cfg.timeout_secs.max(1)),
            )),
        }
    }
}

impl EngineFactory for Aria2Factory {
    fn create(
        &self,
        id: &JobId,
        destination_dir: &Path,
    ) -> Result<Box<dyn TransferEngine>, EngineError> {
        Ok(Box::new(Aria2Engine {
            client: Arc::clone(&self.client),
            uri: id.as_str().to_string(),
            dir: destination_dir.to_path_buf(),
            gid: None,
        }))
    }
}

pub struct Aria2Engine {
    client: Arc<RpcClient>,
    uri: String,
    dir: PathBuf,
    /// Set by `start`; replaced when aria2 hands the magnet over to the real download.
    gid: Option<String>,
}

impl Aria2Engine {
    fn gid(&self) -> Result<&str, EngineError> {
        self.gid
            .as_deref()
            .ok_or_else(|| EngineError::Protocol("engine not started".to_string()))
    }

    async fn tell_status(&self, gid: &str) -> Result<StatusReading, EngineError> {
        let value = self
            .client
            .call("aria2.tellStatus", vec![json!(gid), json!(STATUS_KEYS)])
            .await?;
        decode_status(value)
    }
}

#[async_trait]
impl TransferEngine for Aria2Engine {
    async fn start(&mut self) -> Result<(), EngineError> {
        let options = json!({ "dir": self.dir.to_string_lossy() });
        let value = self
            .client
            .call("aria2.addUri", vec![json!([self.uri]), options])
            .await?;
        match value {
            Value::String(gid) => {
                tracing::debug!(gid = %gid, "aria2 accepted download");
                self.gid = Some(gid);
                Ok(())
            }
            other => Err(EngineError::Protocol(format!("addUri returned {other}"))),
        }
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        let Some(gid) = self.gid.clone() else {
            return Ok(());
        };
        match self.client.call("aria2.remove", vec![json!(gid)]).await {
            Ok(_) => Ok(()),
            // Already complete or errored: only the result entry is left to drop.
            Err(EngineError::Rpc(_)) => self
                .client
                .call("aria2.removeDownloadResult", vec![json!(gid)])
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        }
    }

    async fn status(&mut self) -> Result<Option<EngineSnapshot>, EngineError> {
        let mut gid = self.gid()?.to_string();
        // A magnet is a metadata download followed by the payload download.
        for _ in 0..2 {
            match self.tell_status(&gid).await? {
                StatusReading::Waiting => return Ok(None),
                StatusReading::Snapshot(s) => return Ok(Some(s)),
                StatusReading::FollowedBy(next) => {
                    tracing::debug!(from = %gid, to = %next, "aria2 metadata resolved");
                    self.gid = Some(next.clone());
                    gid = next;
                }
            }
        }
        Ok(None)
    }

    async fn files(&mut self) -> Result<Vec<String>, EngineError> {
        let gid = self.gid()?.to_string();
        let value = self.client.call("aria2.getFiles", vec![json!(gid)]).await?;
        decode_files(value, &self.dir)
    }
}
