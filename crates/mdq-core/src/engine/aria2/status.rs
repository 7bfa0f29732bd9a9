//! Decoding of `aria2.tellStatus` and `aria2.getFiles` results.
//!
//! aria2 reports every number as a decimal string.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::engine::{EngineError, EngineSnapshot};

/// Keys requested from `aria2.tellStatus`.
pub(crate) const STATUS_KEYS: &[&str] = &[
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "connections",
    "followedBy",
    "errorMessage",
    "seeder",
    "bittorrent",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    status: String,
    #[serde(default)]
    total_length: Option<String>,
    #[serde(default)]
    completed_length: Option<String>,
    #[serde(default)]
    download_speed: Option<String>,
    #[serde(default)]
    connections: Option<String>,
    #[serde(default)]
    followed_by: Vec<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    seeder: Option<String>,
    #[serde(default)]
    bittorrent: Option<RawBittorrent>,
}

#[derive(Debug, Deserialize)]
struct RawBittorrent {
    #[serde(default)]
    info: Option<RawInfo>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    name: Option<String>,
}

/// What one `tellStatus` answer means for the poll loop.
#[derive(Debug, PartialEq)]
pub(crate) enum StatusReading {
    /// Queued inside aria2; nothing to report yet.
    Waiting,
    /// Metadata phase of a magnet finished; continue polling this gid instead.
    FollowedBy(String),
    Snapshot(EngineSnapshot),
}

fn number(field: &'static str, raw: Option<&str>) -> Result<u64, EngineError> {
    match raw {
        None | Some("") => Ok(0),
        Some(s) => s
            .parse()
            .map_err(|_| EngineError::Protocol(format!("{field} is not a number: {s:?}"))),
    }
}

pub(crate) fn decode_status(value: Value) -> Result<StatusReading, EngineError> {
    let raw: RawStatus = serde_json::from_value(value)
        .map_err(|e| EngineError::Protocol(format!("tellStatus: {e}")))?;

    if let Some(next) = raw.followed_by.first() {
        return Ok(StatusReading::FollowedBy(next.clone()));
    }

    let total = number("totalLength", raw.total_length.as_deref())?;
    let completed = number("completedLength", raw.completed_length.as_deref())?;
    let rate = number("downloadSpeed", raw.download_speed.as_deref())?;
    let peers = number("connections", raw.connections.as_deref())?;
    let seeding = raw.seeder.as_deref() == Some("true");
    let name = raw
        .bittorrent
        .and_then(|bt| bt.info)
        .and_then(|info| info.name)
        .filter(|n| !n.is_empty());

    let (is_downloading, is_finished) = match raw.status.as_str() {
        "waiting" => return Ok(StatusReading::Waiting),
        "error" => {
            let message = raw
                .error_message
                .unwrap_or_else(|| "download failed".to_string());
            return Err(EngineError::Rpc(message));
        }
        "removed" => return Err(EngineError::Rpc("download was removed from aria2".to_string())),
        "complete" => (false, true),
        "active" => (!seeding, seeding),
        "paused" => (false, false),
        other => return Err(EngineError::Protocol(format!("unknown status {other:?}"))),
    };

    let progress = if is_finished {
        100.0
    } else if total > 0 {
        (completed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Ok(StatusReading::Snapshot(EngineSnapshot {
        peer_count: u32::try_from(peers).unwrap_or(u32::MAX),
        progress,
        rate,
        total_size: (total > 0).then_some(total),
        is_downloading,
        is_finished,
        name,
    }))
}

#[derive(Debug, Deserialize)]
struct RawFile {
    path: String,
}

/// Paths from `aria2.getFiles`, made relative to `destination_dir` where possible.
/// Paths outside it are returned unchanged so the path guard can reject them.
pub(crate) fn decode_files(value: Value, destination_dir: &Path) -> Result<Vec<String>, EngineError> {
    let files: Vec<RawFile> = serde_json::from_value(value)
        .map_err(|e| EngineError::Protocol(format!("getFiles: {e}")))?;
    Ok(files
        .into_iter()
        .filter(|f| !f.path.is_empty())
        .map(|f| {
            let path = Path::new(&f.path);
            match path.strip_prefix(destination_dir) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => f.path.clone(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(reading: StatusReading) -> EngineSnapshot {
        match reading {
            StatusReading::Snapshot(s) => s,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn active_download_maps_numbers() {
        let s = snapshot(
            decode_status(json!({
                "gid": "a1", "status": "active",
                "totalLength": "1000", "completedLength": "250",
                "downloadSpeed": "50", "connections": "7", "seeder": "false"
            }))
            .unwrap(),
        );
        assert_eq!(s.peer_count, 7);
        assert_eq!(s.rate, 50);
        assert_eq!(s.total_size, Some(1000));
        assert!((s.progress - 25.0).abs() < 1e-9);
        assert!(s.is_downloading);
        assert!(!s.is_finished);
        assert_eq!(s.name, None);
    }

    #[test]
    fn torrent_name_comes_from_info_dictionary() {
        let s = snapshot(
            decode_status(json!({
                "status": "active", "totalLength": "10", "connections": "1",
                "bittorrent": {"info": {"name": "ubuntu-24.04.iso"}, "mode": "single"}
            }))
            .unwrap(),
        );
        assert_eq!(s.name.as_deref(), Some("ubuntu-24.04.iso"));

        // Magnet metadata phase: aria2 sends an empty bittorrent object.
        let s = snapshot(decode_status(json!({"status": "active", "bittorrent": {}})).unwrap());
        assert_eq!(s.name, None);
    }

    #[test]
    fn unknown_size_is_none() {
        let s = snapshot(
            decode_status(json!({"status": "active", "totalLength": "0", "connections": "0"})).unwrap(),
        );
        assert_eq!(s.total_size, None);
        assert_eq!(s.progress, 0.0);
    }

    #[test]
    fn seeding_counts_as_finished() {
        let s = snapshot(
            decode_status(json!({
                "status": "active", "totalLength": "10", "completedLength": "10", "seeder": "true"
            }))
            .unwrap(),
        );
        assert!(s.is_finished);
        assert!(!s.is_downloading);
    }

    #[test]
    fn metadata_phase_is_followed() {
        let reading = decode_status(json!({"status": "complete", "followedBy": ["b2"]})).unwrap();
        assert_eq!(reading, StatusReading::FollowedBy("b2".to_string()));
    }

    #[test]
    fn waiting_has_no_snapshot() {
        assert_eq!(
            decode_status(json!({"status": "waiting"})).unwrap(),
            StatusReading::Waiting
        );
    }

    #[test]
    fn error_status_carries_message() {
        let err = decode_status(json!({"status": "error", "errorMessage": "disk full"})).unwrap_err();
        assert!(matches!(err, EngineError::Rpc(ref m) if m == "disk full"));
    }

    #[test]
    fn bad_number_is_protocol_error() {
        assert!(matches!(
            decode_status(json!({"status": "active", "totalLength": "lots"})),
            Err(EngineError::Protocol(_))
        ));
    }

    #[test]
    fn files_are_relative_to_destination() {
        let files = decode_files(
            json!([
                {"index": "1", "path": "/data/dl/ubuntu/ubuntu.iso", "length": "100"},
                {"index": "2", "path": "/etc/passwd", "length": "1"},
                {"index": "3", "path": "", "length": "0"}
            ]),
            Path::new("/data/dl"),
        )
        .unwrap();
        assert_eq!(files, vec!["ubuntu/ubuntu.iso".to_string(), "/etc/passwd".to_string()]);
    }
}
