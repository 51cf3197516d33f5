use chrono::{DateTime, SecondsFormat, Utc};

/// Number of leading characters of a secret shown in logs and status output.
const SECRET_PREVIEW_CHARS: usize = 20;

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

/// Show only the first few characters of a token, never the whole value.
pub fn preview_secret(secret: &str) -> String {
    let head: String = secret.chars().take(SECRET_PREVIEW_CHARS).collect();
    format!("{}...", head)
}

/// Human readable byte count (1023 B, 1.5 KB, 2.0 MB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// ISO-8601 with millisecond precision and a `Z` suffix, the layout used
/// for persisted token expiry.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("facture-été.pdf", 10), "facture...");
    }

    #[test]
    fn test_preview_secret() {
        let token = "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjE3MDAwMDAwMDB9.sig";
        assert_eq!(preview_secret(token), "eyJhbGciOiJIUzI1NiJ9...");
        assert_eq!(preview_secret("short"), "short...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.0 MB");
    }

    #[test]
    fn test_format_timestamp_millis() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_timestamp(&at), "2023-11-14T22:13:20.000Z");
    }
}
