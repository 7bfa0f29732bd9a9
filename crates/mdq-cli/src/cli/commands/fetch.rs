//! `mdq fetch <name>` – copy a downloaded file to a path or stdout.

use anyhow::{Context, Result};
use mdq_core::config::MdqConfig;
use mdq_core::paths;
use std::path::Path;

pub async fn run_fetch(cfg: &MdqConfig, name: &str, output: Option<&Path>) -> Result<()> {
    let dest = cfg.resolve_destination_dir()?;
    let (path, mut file) = paths::open_within(&dest, name).await?;
    tracing::debug!(path = %path.display(), "fetching file");

    let copied = match output {
        Some(out) => {
            let mut target = tokio::fs::File::create(out)
                .await
                .with_context(|| format!("create {}", out.display()))?;
            let n = tokio::io::copy(&mut file, &mut target).await?;
            println!("Wrote {n} bytes to {}", out.display());
            n
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let n = tokio::io::copy(&mut file, &mut stdout).await?;
            tokio::io::AsyncWriteExt::flush(&mut stdout).await?;
            n
        }
    };
    tracing::info!(name, bytes = copied, "fetched");
    Ok(())
}
