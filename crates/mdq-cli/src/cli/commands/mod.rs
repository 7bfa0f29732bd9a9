//! CLI command handlers, one file per command.
//!
//! `add`, `cancel` and `status` go through the daemon's control socket when
//! `mdq run` is listening, and otherwise act on the state file directly.

mod add;
mod cancel;
mod fetch;
mod run;
mod status;

pub use add::run_add;
pub use cancel::run_cancel;
pub use fetch::run_fetch;
pub use run::run_daemon;
pub use status::run_status;

use anyhow::Result;
use mdq_core::config::MdqConfig;
use mdq_core::control::{self, ControlRequest, ControlResponse};
use mdq_core::engine::aria2::Aria2Factory;
use mdq_core::queue::{DownloadQueue, QueueSettings};
use mdq_core::store::StateStore;
use std::sync::Arc;

use crate::cli::control_socket;

/// Open the queue over the configured state file and aria2 endpoint.
pub(crate) fn open_queue(cfg: &MdqConfig) -> Result<DownloadQueue> {
    let settings = QueueSettings::from_config(cfg)?;
    let store = StateStore::new(cfg.resolve_state_file()?);
    let factory = Arc::new(Aria2Factory::new(&cfg.aria2));
    DownloadQueue::open(settings, store, factory)
}

/// Send `request` to a running daemon, or handle it against the state file
/// when none is listening. Offline there is no dispatch and no active job.
pub(crate) async fn request_or_offline(
    cfg: &MdqConfig,
    request: ControlRequest,
) -> Result<ControlResponse> {
    if let Ok(path) = control::default_control_socket_path() {
        if let Some(response) = control_socket::send_request(&path, &request).await? {
            return Ok(response);
        }
    }
    tracing::debug!("no daemon listening; using state file directly");
    let queue = open_queue(cfg)?;
    Ok(control::handle_request(&queue, request).await)
}
