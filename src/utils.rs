//! Formatting helpers for tables and messages

use chrono::{DateTime, Utc};

pub fn format_duration(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Human-readable age of `since`, or "-" when unknown.
pub fn format_age(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    since
        .map(|t| format_duration(now.signed_duration_since(t).num_seconds().max(0) as u64))
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(90), "1m");
        assert_eq!(format_duration(3665), "1h 1m");
        assert_eq!(format_duration(3 * 86_400 + 7200), "3d 2h");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(None, now), "-");
        assert_eq!(format_age(Some(now - chrono::Duration::days(2)), now), "2d 0h");
        // clock skew never yields a negative age
        assert_eq!(format_age(Some(now + chrono::Duration::hours(1)), now), "0m");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1536.0), "1.5 KiB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0 * 1024.0), "3.0 GiB");
        assert_eq!(format_bytes(-5.0), "0 B");
    }
}
