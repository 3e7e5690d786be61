// src/recipe/schedule.rs

//! Schedule resolver: a pure function of (schedule, trigger time).

use chrono::{DateTime, TimeDelta, Utc};

use crate::recipe::model::Schedule;

/// Zero the seconds and sub-second part of a UTC timestamp.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    let floored = secs - secs.rem_euclid(60);
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// Next due time for `schedule`, relative to the minute `trigger` falls in.
///
/// Returns `None` when the result would not fit in a `DateTime<Utc>`.
/// An all-zero schedule resolves to the trigger minute itself.
pub fn next_due(schedule: &Schedule, trigger: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let offset = TimeDelta::days(i64::from(schedule.day))
        + TimeDelta::hours(i64::from(schedule.hour))
        + TimeDelta::minutes(i64::from(schedule.min));

    truncate_to_minute(trigger).checked_add_signed(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn truncation_drops_seconds_and_nanos() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 59).unwrap()
            + TimeDelta::nanoseconds(999_999_999);
        assert_eq!(
            truncate_to_minute(ts),
            Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 0).unwrap()
        );
    }

    #[test]
    fn truncation_is_idempotent() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 27, 0).unwrap();
        assert_eq!(truncate_to_minute(ts), ts);
    }

    #[test]
    fn next_due_adds_interval_to_trigger_minute() {
        let trigger = Utc.with_ymd_and_hms(2024, 12, 31, 23, 45, 12).unwrap();
        let due = next_due(&Schedule::new(1, 2, 30), trigger).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2025, 1, 2, 2, 15, 0).unwrap());
    }

    #[test]
    fn zero_schedule_resolves_to_trigger_minute() {
        let trigger = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 42).unwrap();
        let due = next_due(&Schedule::default(), trigger).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn overflow_is_reported_as_none() {
        assert!(next_due(&Schedule::new(u32::MAX, 0, 0), DateTime::<Utc>::MAX_UTC).is_none());
    }
}
