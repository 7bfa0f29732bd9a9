//! Completion bookkeeping: turn the engine's file list into a Completed Record.

use std::path::Path;

use crate::job::{unix_timestamp, CompletedFile, CompletedRecord, JobId};
use crate::paths::resolve_within;

/// Build the record for a finished job. Names that escape the destination
/// directory, or that do not resolve to a regular file, are logged and left out.
pub(crate) async fn completed_record(
    id: &JobId,
    destination_dir: &Path,
    names: &[String],
) -> CompletedRecord {
    let now = unix_timestamp();
    let mut files = Vec::with_capacity(names.len());
    for name in names {
        let path = match resolve_within(destination_dir, name) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(job = %id, "not recording produced file: {}", e);
                continue;
            }
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(CompletedFile {
                name: name.clone(),
                size: meta.len(),
                completed_at: now,
            }),
            Ok(_) => tracing::debug!(job = %id, file = %name, "skipping non-file entry"),
            Err(e) => tracing::warn!(job = %id, file = %name, "produced file missing: {}", e),
        }
    }
    CompletedRecord {
        id: id.clone(),
        files,
        created_at: now,
    }
}
