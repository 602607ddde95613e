use chrono::{DateTime, Local};

const UNITS: &[&str] = &["KB", "MB", "GB", "TB"];

/// Human-readable size using 1024-based units.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    for unit in UNITS {
        size /= 1024.0;
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
    }

    format!("{:.1} PB", size / 1024.0)
}

/// Render an RFC 3339 modification time as local `YYYY-MM-DD HH:MM`.
pub fn format_modified(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%H:%M:%S").to_string()
}

pub fn format_progress(percentage: Option<u8>, status: &str) -> String {
    match percentage {
        Some(pct) => format!("{status} ({pct}%)"),
        None => status.to_string(),
    }
}
