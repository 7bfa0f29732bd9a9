//! Control protocol: JSON-lines requests and responses for the local control
//! socket, and the handler that maps them onto queue operations.
//!
//! One request object per line, answered by one response object per line.
//! The transport (a Unix socket served by `mdq run`) lives in the binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::QueueError;
use crate::queue::{CancelOutcome, DownloadQueue, QueueStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Submit { id: String },
    Cancel { id: String },
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ControlResponse {
    Queued { position: usize },
    Duplicate,
    Rejected { reason: String },
    RemovedFromQueue,
    RemovedFromActive,
    NotFound,
    Status { status: QueueStatus },
    Error { message: String },
}

impl From<CancelOutcome> for ControlResponse {
    fn from(outcome: CancelOutcome) -> Self {
        match outcome {
            CancelOutcome::RemovedFromQueue => ControlResponse::RemovedFromQueue,
            CancelOutcome::RemovedFromActive => ControlResponse::RemovedFromActive,
            CancelOutcome::NotFound => ControlResponse::NotFound,
        }
    }
}

/// Map a submit result onto the wire response.
pub fn submit_response(result: Result<usize, QueueError>) -> ControlResponse {
    match result {
        Ok(position) => ControlResponse::Queued { position },
        Err(QueueError::Duplicate(_)) => ControlResponse::Duplicate,
        Err(QueueError::Admission(reason)) => ControlResponse::Rejected { reason },
        Err(e) => ControlResponse::Error {
            message: e.to_string(),
        },
    }
}

pub async fn handle_request(queue: &DownloadQueue, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Submit { id } => submit_response(queue.submit(&id).await),
        ControlRequest::Cancel { id } => queue.cancel(&id).await.into(),
        ControlRequest::Status => ControlResponse::Status {
            status: queue.status(),
        },
    }
}

/// Parse and handle one request line. Malformed input yields an `error` response.
pub async fn handle_line(queue: &DownloadQueue, line: &str) -> ControlResponse {
    match serde_json::from_str::<ControlRequest>(line) {
        Ok(request) => handle_request(queue, request).await,
        Err(e) => ControlResponse::Error {
            message: format!("bad request: {e}"),
        },
    }
}

/// Default path for the control socket (same XDG state dir as the state file).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("mdq")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineFactory, TransferEngine};
    use crate::job::JobId;
    use crate::queue::QueueSettings;
    use crate::store::StateStore;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoEngine;

    impl EngineFactory for NoEngine {
        fn create(
            &self,
            _id: &JobId,
            _destination_dir: &Path,
        ) -> Result<Box<dyn TransferEngine>, EngineError> {
            Err(EngineError::Transport("unused".to_string()))
        }
    }

    fn queue(dir: &Path) -> DownloadQueue {
        let settings = QueueSettings {
            destination_dir: dir.join("dl"),
            max_active: 1,
            stall_timeout: Duration::from_secs(120),
            dispatch_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(10),
        };
        DownloadQueue::open(settings, StateStore::new(dir.join("state.json")), Arc::new(NoEngine))
            .unwrap()
    }

    #[test]
    fn request_wire_format() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"op":"submit","id":"magnet:?xt=a"}"#).unwrap();
        assert_eq!(
            req,
            ControlRequest::Submit {
                id: "magnet:?xt=a".to_string()
            }
        );
        let req: ControlRequest = serde_json::from_str(r#"{"op":"status"}"#).unwrap();
        assert_eq!(req, ControlRequest::Status);
        assert_eq!(
            serde_json::to_string(&ControlResponse::RemovedFromQueue).unwrap(),
            r#"{"result":"removed_from_queue"}"#
        );
    }

    #[tokio::test]
    async fn handler_submit_cancel_status() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());

        let submit = |id: &str| ControlRequest::Submit { id: id.to_string() };
        assert_eq!(
            handle_request(&q, submit("magnet:?xt=a")).await,
            ControlResponse::Queued { position: 1 }
        );
        assert_eq!(
            handle_request(&q, submit("magnet:?xt=a")).await,
            ControlResponse::Duplicate
        );
        assert!(matches!(
            handle_request(&q, submit("")).await,
            ControlResponse::Rejected { .. }
        ));

        match handle_request(&q, ControlRequest::Status).await {
            ControlResponse::Status { status } => {
                assert_eq!(status.pending.len(), 1);
                assert_eq!(status.pending[0].position, 1);
            }
            other => panic!("expected status, got {other:?}"),
        }

        let cancel = ControlRequest::Cancel {
            id: "magnet:?xt=a".to_string(),
        };
        assert_eq!(
            handle_request(&q, cancel.clone()).await,
            ControlResponse::RemovedFromQueue
        );
        assert_eq!(handle_request(&q, cancel).await, ControlResponse::NotFound);
    }

    #[tokio::test]
    async fn malformed_line_is_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        assert!(matches!(
            handle_line(&q, "pause 1").await,
            ControlResponse::Error { .. }
        ));
    }
}
