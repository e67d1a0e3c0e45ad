//! Formatting helpers shared by the exporter and front ends.

use chrono::{DateTime, Utc};

/// Format a currency amount with exactly two decimal places.
pub fn format_currency(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Format a quantity with its unit, e.g. `10 bags` or `2.5 m2`.
pub fn format_quantity(quantity: f64, unit: &str) -> String {
    format!("{} {}", quantity, unit)
}

/// Format a byte count as megabytes with one decimal, e.g. `12.3 MB`.
pub fn format_size_mb(size_bytes: u64) -> String {
    format!("{:.1} MB", size_bytes as f64 / 1024.0 / 1024.0)
}

/// Format stage progress as a whole percent, e.g. `67%`.
pub fn format_progress(progress: f32) -> String {
    format!("{}%", progress.round() as i64)
}

/// Truncate to at most `max_chars` characters, appending `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}
