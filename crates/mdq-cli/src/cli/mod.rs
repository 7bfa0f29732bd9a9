//! CLI for the MDQ magnet download queue.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdq_core::config;
use std::path::PathBuf;

use commands::{run_add, run_cancel, run_daemon, run_fetch, run_status};

/// Top-level CLI for the MDQ download queue.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: capped admission queue for magnet downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the queue daemon: admit, supervise and persist jobs until Ctrl-C.
    Run {
        /// Override `max_active` from the config file.
        #[arg(long, value_name = "N")]
        max_active: Option<usize>,
    },

    /// Queue a magnet link.
    Add {
        /// Magnet link (or other absolute resource URI).
        magnet: String,
    },

    /// Cancel a pending or active job.
    Cancel {
        /// Magnet link exactly as it was added.
        magnet: String,
    },

    /// Show pending, active and completed jobs.
    Status {
        /// Print the full status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Copy a downloaded file out of the destination directory.
    Fetch {
        /// File name relative to the destination directory.
        name: String,
        /// Write to this path instead of stdout.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run { max_active } => {
                if let Some(n) = max_active {
                    cfg.max_active = n;
                }
                run_daemon(&cfg).await?;
            }
            CliCommand::Add { magnet } => run_add(&cfg, &magnet).await?,
            CliCommand::Cancel { magnet } => run_cancel(&cfg, &magnet).await?,
            CliCommand::Status { json } => run_status(&cfg, json).await?,
            CliCommand::Fetch { name, output } => run_fetch(&cfg, &name, output.as_deref()).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
