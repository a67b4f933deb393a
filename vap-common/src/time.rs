//! Timestamp utilities
//!
//! Attendance is keyed by the calendar day of the machine running the service,
//! so "today" and "time of day" are taken in local time while audit timestamps
//! stay in UTC.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Timelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar date in the local timezone
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Local wall-clock time truncated to whole seconds
pub fn local_time_of_day() -> NaiveTime {
    truncate_to_seconds(Local::now().time())
}

/// Drop sub-second precision so times render as `HH:MM:SS`
pub fn truncate_to_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

/// Whole seconds elapsed since `since`, clamped at zero
pub fn seconds_since(since: DateTime<Utc>) -> u64 {
    now().signed_duration_since(since).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_truncate_to_seconds_drops_nanos() {
        let time = NaiveTime::from_hms_nano_opt(9, 15, 42, 123_456_789).unwrap();
        let truncated = truncate_to_seconds(time);
        assert_eq!(truncated, NaiveTime::from_hms_opt(9, 15, 42).unwrap());
        assert_eq!(truncated.to_string(), "09:15:42");
    }

    #[test]
    fn test_local_time_of_day_has_no_fraction() {
        assert_eq!(local_time_of_day().nanosecond(), 0);
    }

    #[test]
    fn test_seconds_since_past_and_future() {
        assert!(seconds_since(now() - Duration::seconds(30)) >= 30);
        assert_eq!(seconds_since(now() + Duration::hours(1)), 0);
    }
}
