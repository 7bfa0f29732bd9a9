//! `mdq status` – show pending, active and completed jobs.

use anyhow::{bail, Result};
use mdq_core::config::MdqConfig;
use mdq_core::control::{ControlRequest, ControlResponse};
use mdq_core::queue::QueueStatus;
use mdq_core::supervisor::format_bytes;

use super::request_or_offline;

pub async fn run_status(cfg: &MdqConfig, json: bool) -> Result<()> {
    let status = match request_or_offline(cfg, ControlRequest::Status).await? {
        ControlResponse::Status { status } => status,
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_table(&status);
    }
    Ok(())
}

fn print_table(status: &QueueStatus) {
    println!("Destination: {}", status.destination_dir.display());

    if status.active.is_empty() {
        println!("\nNo active downloads.");
    } else {
        println!(
            "\n{:<13} {:>7} {:>6} {:>12} {:>9}  {}",
            "STATE", "DONE", "PEERS", "RATE", "ETA", "NAME"
        );
        for a in &status.active {
            println!(
                "{:<13} {:>6.2}% {:>6} {:>12} {:>9}  {}",
                a.state.as_str(),
                a.progress,
                a.peers,
                a.rate,
                a.eta,
                a.name.as_deref().unwrap_or(a.id.as_str())
            );
        }
    }

    if status.pending.is_empty() {
        println!("\nQueue is empty.");
    } else {
        println!("\n{:<4} {}", "POS", "MAGNET");
        for p in &status.pending {
            println!("{:<4} {}", p.position, p.id);
        }
    }

    if !status.completed.is_empty() {
        println!("\nCompleted:");
        for c in &status.completed {
            println!("  {}", c.id);
            for f in &c.files {
                println!("    {} ({})", f.name, format_bytes(f.size));
            }
        }
    }
}
