use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_index(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("{field} contains invalid index {value}"))
}

pub fn to_count(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range count {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_values() {
        assert!(to_index(-1, "line_index").is_err());
        assert!(to_count(-5, "view_count").is_err());
        assert_eq!(to_count(7, "view_count").unwrap(), 7);
    }

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_datetime("2024-05-01T10:00:00+02:00", "updated_at").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_datetime("yesterday", "updated_at").is_err());
    }
}
