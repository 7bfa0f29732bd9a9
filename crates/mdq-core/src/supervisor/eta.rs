//! ETA and human-readable rate/size rendering.

use std::time::Duration;

/// Remaining time for `total_size * (1 - progress/100)` bytes at `rate` bytes/sec.
///
/// `None` ("unknown") when the rate is zero, the size is unknown or zero, or
/// progress is already at (or beyond) 100%.
pub fn compute_eta(progress: f64, rate: u64, total_size: Option<u64>) -> Option<Duration> {
    let total = total_size.filter(|&t| t > 0)?;
    if rate == 0 || !progress.is_finite() || progress >= 100.0 {
        return None;
    }
    let remaining_fraction = 1.0 - progress.max(0.0) / 100.0;
    let secs = (total as f64 * remaining_fraction / rate as f64).ceil();
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs(secs as u64))
}

/// `MM:SS`, or `H:MM:SS` from one hour up; `unknown` when there is no estimate.
pub fn format_eta(eta: Option<Duration>) -> String {
    let Some(eta) = eta else {
        return "unknown".to_string();
    };
    let secs = eta.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Binary-unit size, e.g. `1.50 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Binary-unit rate, e.g. `512 B/s`, `1.50 MiB/s`.
pub fn format_rate(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}
