//! Pure next-occurrence arithmetic for wall-clock alarms.
//!
//! Everything here is stateless; the scheduling layer feeds it the current
//! time through the [`WallClock`] seam so tests can drive a simulated clock.

use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike,
    Utc, Weekday,
};

use crate::alarm::RepeatDays;

/// Source of "now" for the scheduling core.
pub trait WallClock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Remaining time until a target, decomposed for display.
///
/// Not clamped: an overdue target yields negative components and callers
/// decide how to render that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

pub fn remaining(now: DateTime<Utc>, target: DateTime<Utc>) -> Remaining {
    let total = (target - now).num_seconds();
    Remaining {
        hours: total / 3600,
        minutes: total % 3600 / 60,
        seconds: total % 60,
    }
}

/// Days from `from` forward to `to`, in `[0, 6]`.
pub fn weekday_distance(from: Weekday, to: Weekday) -> u32 {
    (7 + to.num_days_from_sunday() - from.num_days_from_sunday()) % 7
}

/// The next occurrence of `at` after `now`, honouring a weekday repeat set.
///
/// With an empty set this is today if `at` is still ahead of `now`'s
/// time-of-day, else tomorrow. With a non-empty set the weekdays are scanned
/// starting from `now`'s weekday; today only counts if the time-of-day is
/// strictly in the future (hour/minute/second comparison only, never the
/// date). When the only matching weekday is today-but-past the scan wraps a
/// full week.
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime, repeat: RepeatDays) -> NaiveDateTime {
    let at = at.with_nanosecond(0).expect("zero nanosecond is always valid");

    if repeat.is_empty() {
        let days = if at > now.time() { 0 } else { 1 };
        return advance(now.date(), days).and_time(at);
    }

    let start = now.weekday().num_days_from_sunday();
    for offset in 0..=7 {
        let day = (start + offset) % 7;
        if repeat.contains_index(day) && (offset > 0 || at > now.time()) {
            return advance(now.date(), offset).and_time(at);
        }
    }

    unreachable!("a non-empty repeat set always matches within a week")
}

/// [`next_occurrence`] evaluated in local time and mapped back to UTC.
///
/// Daylight-saving transitions are resolved by `chrono::Local`; an ambiguous
/// local time takes the earlier instant and a nonexistent one (spring-forward
/// gap) slides an hour forward.
pub fn next_fire_after(now: DateTime<Utc>, at: NaiveTime, repeat: RepeatDays) -> DateTime<Utc> {
    let local_now = now.with_timezone(&Local).naive_local();
    resolve_local(next_occurrence(local_now, at, repeat)).with_timezone(&Utc)
}

fn advance(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_signed(TimeDelta::days(days as i64))
        .expect("not realistic to overflow")
}

fn resolve_local(naive: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .expect("every DST gap is shorter than an hour")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    // 2025-05-31 is a Saturday.
    fn saturday_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 31)
            .unwrap()
            .and_time(at(12, 0, 0))
    }

    #[test]
    fn one_shot_later_today_stays_today() {
        let next = next_occurrence(saturday_noon(), at(13, 0, 0), RepeatDays::empty());

        assert_eq!(next, saturday_noon().date().and_time(at(13, 0, 0)));
    }

    #[test]
    fn one_shot_past_time_goes_to_tomorrow() {
        let next = next_occurrence(saturday_noon(), at(11, 0, 0), RepeatDays::empty());

        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_time(at(11, 0, 0))
        );
    }

    #[test]
    fn one_shot_exact_current_time_goes_to_tomorrow() {
        let next = next_occurrence(saturday_noon(), at(12, 0, 0), RepeatDays::empty());

        assert_eq!((next - saturday_noon()).num_hours(), 24);
    }

    #[test]
    fn repeating_picks_earliest_matching_weekday() {
        // Saturday noon, repeating on Mon + Wed: Monday is 2 days out.
        let repeat = RepeatDays::empty().with(Weekday::Mon).with(Weekday::Wed);
        let next = next_occurrence(saturday_noon(), at(8, 0, 0), repeat);

        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_time(at(8, 0, 0))
        );
    }

    #[test]
    fn repeating_same_day_future_time_stays_today() {
        let repeat = RepeatDays::empty().with(Weekday::Sat);
        let next = next_occurrence(saturday_noon(), at(18, 30, 0), repeat);

        assert_eq!(next, saturday_noon().date().and_time(at(18, 30, 0)));
    }

    #[test]
    fn repeating_only_today_but_past_wraps_a_full_week() {
        let repeat = RepeatDays::empty().with(Weekday::Sat);
        let next = next_occurrence(saturday_noon(), at(9, 0, 0), repeat);

        assert_eq!((next.date() - saturday_noon().date()).num_days(), 7);
        assert_eq!(next.time(), at(9, 0, 0));
    }

    #[test]
    fn weekday_distance_wraps_modulo_seven() {
        assert_eq!(weekday_distance(Weekday::Sun, Weekday::Sun), 0);
        assert_eq!(weekday_distance(Weekday::Sun, Weekday::Sat), 6);
        assert_eq!(weekday_distance(Weekday::Fri, Weekday::Mon), 3);
        assert_eq!(weekday_distance(Weekday::Mon, Weekday::Fri), 4);
    }

    #[test]
    fn remaining_decomposes_without_clamping() {
        let now = Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap();

        let ahead = remaining(now, now + TimeDelta::seconds(3 * 3600 + 25 * 60 + 7));
        assert_eq!(
            ahead,
            Remaining {
                hours: 3,
                minutes: 25,
                seconds: 7
            }
        );

        let overdue = remaining(now, now - TimeDelta::seconds(90));
        assert_eq!(
            overdue,
            Remaining {
                hours: 0,
                minutes: -1,
                seconds: -30
            }
        );
    }

    fn repeat_strategy() -> impl Strategy<Value = RepeatDays> {
        (0u8..0x80).prop_map(RepeatDays::from_bits)
    }

    fn datetime_strategy() -> impl Strategy<Value = NaiveDateTime> {
        (0i64..36_500, 0u32..86_400).prop_map(|(days, secs)| {
            NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .checked_add_signed(TimeDelta::days(days))
                .unwrap()
                .and_time(NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap())
        })
    }

    #[test_strategy::proptest]
    fn one_shot_is_strictly_future_within_a_day(
        #[strategy(datetime_strategy())] now: NaiveDateTime,
        #[strategy(arb::<NaiveTime>())] fire_at: NaiveTime,
    ) {
        let fire_at = fire_at.with_nanosecond(0).unwrap();

        let next = next_occurrence(now, fire_at, RepeatDays::empty());

        prop_assert!(next > now, "next occurrence must be in the future");
        prop_assert!((next - now).num_seconds() <= 86_400, "one-shot is at most a day out");
        prop_assert_eq!(next.time(), fire_at);
    }

    #[test_strategy::proptest]
    fn repeating_is_earliest_matching_weekday(
        #[strategy(datetime_strategy())] now: NaiveDateTime,
        #[strategy(arb::<NaiveTime>())] fire_at: NaiveTime,
        #[strategy(repeat_strategy())] repeat: RepeatDays,
    ) {
        prop_assume!(!repeat.is_empty());
        let fire_at = fire_at.with_nanosecond(0).unwrap();

        let next = next_occurrence(now, fire_at, repeat);

        prop_assert!(next > now);
        prop_assert!(repeat.contains(next.weekday()), "result weekday must be in the set");
        prop_assert_eq!(next.time(), fire_at);

        // No earlier candidate: every day strictly between now and the
        // result either is not in the set or (for today) is already past.
        let days_out = (next.date() - now.date()).num_days() as u32;
        for earlier in 0..days_out {
            let day = (now.weekday().num_days_from_sunday() + earlier) % 7;
            let viable = repeat.contains_index(day) && (earlier > 0 || fire_at > now.time());
            prop_assert!(!viable, "day offset {} would have matched earlier", earlier);
        }
    }
}
