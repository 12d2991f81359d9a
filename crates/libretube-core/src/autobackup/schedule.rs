//! Trigger time calculations for the daily backup.

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, Timelike};

/// Intervals at least this long are aligned to the preferred time of day.
pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Next time the job should fire, given the preferred time of day.
///
/// Seconds of `preferred` are ignored. If today's slot is not before `now`
/// it is used, otherwise the same time tomorrow.
#[must_use]
pub fn next_trigger(now: NaiveDateTime, preferred: NaiveTime) -> NaiveDateTime {
    let preferred = truncate_to_minute(preferred);
    let today = now.date().and_time(preferred);
    if today >= now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// How long to wait before the first run of a job repeating every `interval`.
///
/// Daily (or longer) intervals wait for [`next_trigger`]; shorter intervals
/// start immediately.
#[must_use]
pub fn initial_delay(now: NaiveDateTime, preferred: NaiveTime, interval: Duration) -> Duration {
    if interval < DAILY {
        return Duration::ZERO;
    }
    (next_trigger(now, preferred) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Parse a `HH:MM` time of day.
#[must_use]
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Format a time of day as `HH:MM`.
#[must_use]
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_future_time_fires_today() {
        assert_eq!(next_trigger(at(8, 0, 0), time(9, 30)), at(9, 30, 0));
    }

    #[test]
    fn test_past_time_fires_tomorrow() {
        let next = next_trigger(at(10, 0, 0), time(9, 30));
        assert_eq!(next, at(9, 30, 0) + chrono::Duration::hours(24));
    }

    #[test]
    fn test_exact_time_fires_now() {
        assert_eq!(next_trigger(at(9, 30, 0), time(9, 30)), at(9, 30, 0));
    }

    #[test]
    fn test_seconds_are_ignored() {
        let preferred = NaiveTime::from_hms_opt(9, 30, 45).unwrap();
        assert_eq!(next_trigger(at(9, 30, 10), preferred), at(9, 30, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn test_initial_delay() {
        assert_eq!(
            initial_delay(at(8, 0, 0), time(9, 30), DAILY),
            Duration::from_secs(90 * 60)
        );
        assert_eq!(
            initial_delay(at(8, 0, 0), time(9, 30), Duration::from_secs(6 * 3600)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_time_of_day_parsing() {
        assert_eq!(parse_time_of_day("07:05"), Some(time(7, 5)));
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(format_time_of_day(time(7, 5)), "07:05");
    }
}
