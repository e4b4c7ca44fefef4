use chrono::{DateTime, Local, Utc};

/// Compact token-count rendering: "999", "1.5K", "12K", "2.5M", "1.1B".
/// Four-digit counts keep one decimal; five digits and up drop it.
pub fn format_token_count(count: u64) -> String {
    if count >= 1_000_000_000 {
        format!("{:.1}B", count as f64 / 1_000_000_000.0)
    } else if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 10_000 {
        format!("{:.0}K", count as f64 / 1_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Relative reset rendering: "resets in 32m", "resets in 3h 12m",
/// "resets Mon Mar 2", or "resetting..." once due.
pub fn format_reset(resets_at: DateTime<Utc>) -> String {
    format_reset_at(resets_at, Utc::now())
}

fn format_reset_at(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let until = resets_at - now;
    let seconds = until.num_seconds();
    if seconds <= 0 {
        return "resetting...".to_string();
    }
    if seconds < 3600 {
        let minutes = (seconds + 59) / 60;
        return format!("resets in {minutes}m");
    }
    if seconds < 24 * 3600 {
        let hours = seconds / 3600;
        let minutes = (seconds / 60) % 60;
        return format!("resets in {hours}h {minutes}m");
    }
    format!(
        "resets {}",
        resets_at.with_timezone(&Local).format("%a %b %-d")
    )
}
