//! Timestamp parsing and bucketing.

use anyhow::Context;
use chrono::DateTime;

/// Candle interval used when grouping swaps.
pub const CANDLE_INTERVAL_SECS: i64 = 60;

/// Parse an RFC 3339 block time into unix seconds.
pub fn parse_timestamp(value: &str) -> anyhow::Result<i64> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid block timestamp: {}", value))?;
    Ok(parsed.timestamp())
}

/// Floor a unix timestamp to the start of its `interval` bucket.
///
/// Every read and write path buckets with this function so rows written
/// at different moments of the same interval land in the same bucket.
pub fn round_time(timestamp: i64, interval: i64) -> i64 {
    if interval <= 0 {
        return timestamp;
    }
    timestamp.div_euclid(interval) * interval
}

/// Bucket start of an RFC 3339 timestamp.
pub fn bucket(value: &str, interval: i64) -> anyhow::Result<i64> {
    Ok(round_time(parse_timestamp(value)?, interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_floors_to_interval() {
        assert_eq!(bucket("2023-07-12T15:12:16.94Z", 60).unwrap(), 1689174720);
        assert_eq!(bucket("2023-07-12T15:13:01.94Z", 60).unwrap(), 1689174780);
    }

    #[test]
    fn test_round_time_same_bucket() {
        assert_eq!(round_time(1689174720, 60), round_time(1689174779, 60));
        assert_ne!(round_time(1689174779, 60), round_time(1689174780, 60));
        assert_eq!(round_time(1689174736, 3600), 1689174000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert_eq!(parse_timestamp("1970-01-01T00:01:00Z").unwrap(), 60);
    }
}
