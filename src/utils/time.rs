use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time in milliseconds since the Unix epoch
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Milliseconds elapsed since a given timestamp
///
/// Returns 0 if the timestamp is in the future
pub fn millis_since(timestamp_ms: u64) -> u64 {
    current_time_millis().saturating_sub(timestamp_ms)
}

/// Format a time difference in a human-readable format
pub fn format_time_diff(timestamp_ms: u64, include_seconds: bool) -> String {
    let diff = millis_since(timestamp_ms) / 1000;

    if diff < 60 {
        if include_seconds {
            format!("{} seconds ago", diff)
        } else {
            String::from("just now")
        }
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
