//! `mdq add <magnet>` – queue a magnet link.

use anyhow::{bail, Result};
use mdq_core::config::MdqConfig;
use mdq_core::control::{ControlRequest, ControlResponse};

use super::request_or_offline;

pub async fn run_add(cfg: &MdqConfig, magnet: &str) -> Result<()> {
    let request = ControlRequest::Submit {
        id: magnet.to_string(),
    };
    match request_or_offline(cfg, request).await? {
        ControlResponse::Queued { position } => println!("Queued at position {position}"),
        ControlResponse::Duplicate => println!("Already queued, active or completed"),
        ControlResponse::Rejected { reason } => bail!("rejected: {reason}"),
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
    Ok(())
}
