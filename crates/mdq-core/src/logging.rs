//! Tracing setup for the `mdq` binary.
//!
//! The daemon and the one-shot commands share one append-only log,
//! `$XDG_STATE_HOME/mdq/mdq.log`, next to the state file and control socket.
//! `RUST_LOG` overrides [`DEFAULT_FILTER`].

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,mdq=debug,mdq_core=debug";

const LOG_FILE_NAME: &str = "mdq.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Where [`init_logging`] writes. The directory is not created here.
pub fn log_file_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(dirs.get_state_home().join(LOG_FILE_NAME))
}

/// Install a subscriber that appends to [`log_file_path`].
///
/// Fails when the file cannot be opened or a subscriber is already set, so the
/// caller can fall back to [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;

    // `&File` is `Write`, so every event writes through the one shared handle.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Arc::new(file) as Arc<File>)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("install log subscriber: {e}"))?;

    tracing::info!(path = %path.display(), "logging to file");
    Ok(path)
}

/// Log to stderr instead. A subscriber that is already installed is kept.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
