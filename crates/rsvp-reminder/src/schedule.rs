//! Calendar arithmetic for the reminder loop.
//!
//! Everything is generic over the time zone so the loop runs on
//! [`chrono::Local`] while tests pin a fixed offset.

use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};

/// Shortest sleep between two checks.
pub const MIN_DELAY: Duration = Duration::from_secs(60);

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Logical scheduler state for a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// Not the trigger day.
    Waiting,
    /// The local calendar date is the trigger day.
    Firing,
}

/// The day reminders go out: `days_before` days ahead of the event.
pub fn trigger_date(event: NaiveDate, days_before: u32) -> NaiveDate {
    event
        .checked_sub_days(Days::new(u64::from(days_before)))
        .unwrap_or(NaiveDate::MIN)
}

pub fn is_trigger_day<Tz: TimeZone>(now: &DateTime<Tz>, trigger: NaiveDate) -> bool {
    now.date_naive() == trigger
}

pub fn state_at<Tz: TimeZone>(now: &DateTime<Tz>, trigger: NaiveDate) -> ReminderState {
    if is_trigger_day(now, trigger) {
        ReminderState::Firing
    } else {
        ReminderState::Waiting
    }
}

/// Sleep until the next local `hour:00`. At or after today's check time
/// the target is tomorrow's. Never shorter than [`MIN_DELAY`].
pub fn delay_until_next_check<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Duration {
    let tz = now.timezone();
    let check_on = |date: NaiveDate| date.and_hms_opt(hour, 0, 0).and_then(|t| resolve_local(&tz, t));

    let today = now.date_naive();
    let next = match check_on(today) {
        Some(at) if *now < at => Some(at),
        _ => today.succ_opt().and_then(check_on),
    };

    let delay = next
        .and_then(|at| at.signed_duration_since(now.clone()).to_std().ok())
        .unwrap_or(ONE_DAY);
    delay.max(MIN_DELAY)
}

/// Map a wall-clock time to an instant. An ambiguous time takes the
/// earlier instant; a time inside a DST gap moves forward by the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 7, 22, h, m, s)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn trigger_is_ten_days_before() {
        assert_eq!(trigger_date(date(2026, 8, 1), 10), date(2026, 7, 22));
        assert_eq!(trigger_date(date(2026, 3, 5), 10), date(2026, 2, 23));
    }

    #[test]
    fn state_follows_local_date() {
        let trigger = date(2026, 7, 22);
        assert_eq!(state_at(&at(0, 0, 0), trigger), ReminderState::Firing);
        assert_eq!(state_at(&at(23, 59, 59), trigger), ReminderState::Firing);
        assert_eq!(state_at(&at(12, 0, 0), date(2026, 7, 23)), ReminderState::Waiting);
    }

    #[test]
    fn before_check_hour_waits_until_today() {
        assert_eq!(delay_until_next_check(&at(8, 0, 0), 9), Duration::from_secs(3600));
    }

    #[test]
    fn just_before_check_hour_is_floored() {
        assert_eq!(delay_until_next_check(&at(8, 59, 30), 9), MIN_DELAY);
    }

    #[test]
    fn at_or_after_check_hour_targets_tomorrow() {
        assert_eq!(delay_until_next_check(&at(9, 0, 0), 9), ONE_DAY);
        assert_eq!(
            delay_until_next_check(&at(10, 30, 0), 9),
            Duration::from_secs(22 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn midnight_check_hour() {
        assert_eq!(
            delay_until_next_check(&at(23, 0, 0), 0),
            Duration::from_secs(3600)
        );
    }
}
