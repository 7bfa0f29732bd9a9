//! Control socket: server (during `mdq run`) and client (for the other commands).
//! Protocol: one JSON request per line, answered by one JSON response per line.

use anyhow::{bail, Context, Result};
use mdq_core::control::{self, ControlRequest, ControlResponse};
use mdq_core::queue::DownloadQueue;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

/// Spawns a task that listens on `path` and answers requests against `queue`
/// until `stop` fires. The socket file is removed on exit.
///
/// Fails if another daemon already answers on `path`. A socket file nobody
/// listens on is left over from a crash and is replaced.
pub async fn spawn_control_listener(
    queue: DownloadQueue,
    path: impl AsRef<Path>,
    stop: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match UnixStream::connect(&path).await {
        Ok(_) => bail!(
            "daemon already running (control socket {} is live)",
            path.display()
        ),
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
            tracing::debug!(path = %path.display(), "removing stale control socket");
            std::fs::remove_file(&path)
                .with_context(|| format!("remove stale control socket {}", path.display()))?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("connect to control socket {}", path.display()))
        }
    }
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let queue = queue.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(&queue, stream).await {
                                tracing::debug!("control connection: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::debug!("control socket accept: {}", e),
                },
            }
        }
        let _ = std::fs::remove_file(&path);
    });
    Ok(handle)
}

async fn serve_connection(queue: &DownloadQueue, stream: UnixStream) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = control::handle_line(queue, line).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        write.write_all(&out).await?;
    }
    Ok(())
}

/// Sends one request and reads the response. `Ok(None)` when no daemon is
/// listening (socket missing, stale or refusing connections).
pub async fn send_request(
    socket_path: &Path,
    request: &ControlRequest,
) -> Result<Option<ControlResponse>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let (read, mut write) = stream.into_split();
    let mut msg = serde_json::to_vec(request)?;
    msg.push(b'\n');
    write.write_all(&msg).await?;

    let mut lines = BufReader::new(read).lines();
    let line = lines
        .next_line()
        .await?
        .context("daemon closed the control connection without answering")?;
    Ok(Some(serde_json::from_str(&line)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdq_core::engine::{EngineError, EngineFactory, TransferEngine};
    use mdq_core::job::JobId;
    use mdq_core::queue::QueueSettings;
    use mdq_core::store::StateStore;
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

    fn open_queue(dir: &Path) -> DownloadQueue {
        let settings = QueueSettings {
            destination_dir: dir.join("dl"),
            max_active: 1,
            stall_timeout: Duration::from_secs(120),
            dispatch_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(10),
        };
        DownloadQueue::open(
            settings,
            StateStore::new(dir.join("state.json")),
            Arc::new(NoEngine),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn request_roundtrip_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());
        let sock = dir.path().join("control.sock");
        let stop = CancellationToken::new();
        let handle = spawn_control_listener(queue, &sock, stop.clone())
            .await
            .unwrap();

        let submit = ControlRequest::Submit {
            id: "magnet:?xt=urn:btih:abc".to_string(),
        };
        let response = send_request(&sock, &submit).await.unwrap();
        assert_eq!(response, Some(ControlResponse::Queued { position: 1 }));
        let response = send_request(&sock, &submit).await.unwrap();
        assert_eq!(response, Some(ControlResponse::Duplicate));

        stop.cancel();
        handle.await.unwrap();
        assert!(!sock.exists());
        assert_eq!(send_request(&sock, &submit).await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_daemon_leaves_live_socket_alone() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("control.sock");
        let stop = CancellationToken::new();
        let first = spawn_control_listener(open_queue(dir.path()), &sock, stop.clone())
            .await
            .unwrap();

        let other = tempfile::tempdir().unwrap();
        let err = spawn_control_listener(open_queue(other.path()), &sock, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already running"), "{err:#}");

        assert!(sock.exists());
        let response = send_request(&sock, &ControlRequest::Status).await.unwrap();
        assert!(matches!(response, Some(ControlResponse::Status { .. })));

        stop.cancel();
        first.await.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("control.sock");
        // Bound but never accepting, then dropped: the file stays, connects are refused.
        drop(std::os::unix::net::UnixListener::bind(&sock).unwrap());
        assert!(sock.exists());

        let stop = CancellationToken::new();
        let handle = spawn_control_listener(open_queue(dir.path()), &sock, stop.clone())
            .await
            .unwrap();
        let response = send_request(&sock, &ControlRequest::Status).await.unwrap();
        assert!(matches!(response, Some(ControlResponse::Status { .. })));

        stop.cancel();
        handle.await.unwrap();
    }
}
