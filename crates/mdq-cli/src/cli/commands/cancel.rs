//! `mdq cancel <magnet>` – drop a pending job or stop an active one.

use anyhow::{bail, Result};
use mdq_core::config::MdqConfig;
use mdq_core::control::{ControlRequest, ControlResponse};

use super::request_or_offline;

pub async fn run_cancel(cfg: &MdqConfig, magnet: &str) -> Result<()> {
    let request = ControlRequest::Cancel {
        id: magnet.to_string(),
    };
    match request_or_offline(cfg, request).await? {
        ControlResponse::RemovedFromQueue => println!("Removed from queue"),
        ControlResponse::RemovedFromActive => println!("Stopping active download"),
        ControlResponse::NotFound => println!("No pending or active job for that link"),
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
    Ok(())
}
