use chrono::Duration;

/// Whole seconds in `d`, rounded up. Negative durations count as zero.
pub fn ceil_seconds(d: Duration) -> i64 {
    let millis = d.num_milliseconds().max(0);
    millis.saturating_add(999) / 1000
}

/// Format a remaining duration as `m:ss` for countdown display
pub fn format_countdown(remaining: Duration) -> String {
    let secs = ceil_seconds(remaining);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
