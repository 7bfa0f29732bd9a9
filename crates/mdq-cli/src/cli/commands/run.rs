//! `mdq run` – run the queue daemon until Ctrl-C.

use anyhow::{Context, Result};
use mdq_core::config::MdqConfig;
use mdq_core::control;
use mdq_core::queue::JobEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::open_queue;
use crate::cli::control_socket;

pub async fn run_daemon(cfg: &MdqConfig) -> Result<()> {
    let queue = open_queue(cfg)?;
    let socket_path = control::default_control_socket_path().context("control socket path")?;
    let stop_socket = CancellationToken::new();
    let socket =
        control_socket::spawn_control_listener(queue.clone(), &socket_path, stop_socket.clone())
            .await?;
    tracing::debug!(path = %socket_path.display(), "control socket listening");

    let status = queue.status();
    println!(
        "mdq: {} pending, {} completed, up to {} active; downloading into {}",
        status.pending.len(),
        status.completed.len(),
        queue.settings().max_active,
        status.destination_dir.display()
    );

    let mut events = queue.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => report(&event),
                Err(RecvError::Lagged(n)) => tracing::debug!("event log skipped {} event(s)", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let runner = tokio::spawn({
        let queue = queue.clone();
        async move { queue.run().await }
    });

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down; active downloads go back to the head of the queue.");

    stop_socket.cancel();
    queue.shutdown().await;
    if let Err(e) = runner.await {
        tracing::warn!("dispatch task ended abnormally: {}", e);
    }
    let _ = socket.await;
    event_log.abort();

    let status = queue.status();
    tracing::info!(
        pending = status.pending.len(),
        completed = status.completed.len(),
        "daemon stopped"
    );
    Ok(())
}

/// One line per lifecycle event worth telling the operator about.
fn report(event: &JobEvent) {
    tracing::debug!(?event, "job event");
    match event {
        JobEvent::Admitted { id } => println!("started   {id}"),
        JobEvent::Finished { id, files } => println!("finished  {id} ({files} file(s))"),
        JobEvent::Cancelled { id } => println!("cancelled {id}"),
        JobEvent::TimedOut { id, idle_secs } => {
            println!("timed out {id} (no peers for {idle_secs}s)")
        }
        JobEvent::Failed { id, reason } => println!("failed    {id}: {reason}"),
        _ => {}
    }
}
