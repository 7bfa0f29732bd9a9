//! Destination-directory path guard.
//!
//! Every file name that comes from an engine or a caller is resolved here
//! before it is stat'ed or opened. A name may only address something strictly
//! inside the destination directory: no absolute paths, no `..`, and no
//! symlink that lands outside once canonicalized.

use std::path::{Component, Path, PathBuf};

use crate::error::QueueError;

/// Resolve `name` under `destination_dir`, rejecting anything that escapes it.
///
/// Missing targets are allowed here (callers decide what absence means); an
/// existing target must canonicalize to a path inside the canonical directory.
pub fn resolve_within(destination_dir: &Path, name: &str) -> Result<PathBuf, QueueError> {
    let rel = Path::new(name);
    if name.is_empty() || rel.as_os_str().is_empty() {
        return Err(QueueError::PathSecurity("empty file name".to_string()));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(QueueError::PathSecurity(name.to_string()));
            }
        }
    }

    let joined = destination_dir.join(rel);
    if joined == destination_dir {
        return Err(QueueError::PathSecurity(name.to_string()));
    }

    match joined.canonicalize() {
        Ok(canonical) => {
            let base = destination_dir
                .canonicalize()
                .map_err(|_| QueueError::PathSecurity(name.to_string()))?;
            if canonical.starts_with(&base) && canonical != base {
                Ok(canonical)
            } else {
                Err(QueueError::PathSecurity(name.to_string()))
            }
        }
        Err(_) => Ok(joined),
    }
}

/// Open `name` for reading if it is a regular file inside `destination_dir`.
pub async fn open_within(
    destination_dir: &Path,
    name: &str,
) -> Result<(PathBuf, tokio::fs::File), QueueError> {
    let path = resolve_within(destination_dir, name)?;
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| QueueError::FileNotFound(name.to_string()))?;
    if !meta.is_file() {
        return Err(QueueError::FileNotFound(name.to_string()));
    }
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| QueueError::FileNotFound(name.to_string()))?;
    Ok((path, file))
}
