//! Production-day bucketing.
//!
//! A production day runs from the facility cutoff hour to the same hour the
//! next day, so late-night pressing is attributed to the shift it belongs
//! to rather than the calendar date it happened on. Timestamps are facility
//! clock time carried as `DateTime<Utc>`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Reporting granularity understood by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

fn at_cutoff(date: NaiveDate, cutoff_hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &date
            .and_hms_opt(cutoff_hour.min(23), 0, 0)
            .expect("hour clamped to 0..=23"),
    )
}

/// The calendar date that labels the production day containing `ts`.
/// A timestamp before the cutoff belongs to the previous day. An
/// out-of-range cutoff hour is clamped to 23 rather than panicking.
pub fn production_date(ts: DateTime<Utc>, cutoff_hour: u32) -> NaiveDate {
    let date = ts.date_naive();
    if ts.hour() < cutoff_hour.min(23) {
        date - Duration::days(1)
    } else {
        date
    }
}

/// Half-open interval `[cutoff on day D, cutoff on day D+1)` containing `ts`.
pub fn day_boundaries(ts: DateTime<Utc>, cutoff_hour: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = at_cutoff(production_date(ts, cutoff_hour), cutoff_hour);
    (start, start + Duration::days(1))
}

/// Boundaries of the reporting period containing `ts`, aligned to the
/// production-day cutoff. Weeks start on Monday; months and years on their
/// first production day.
pub fn period_boundaries(
    ts: DateTime<Utc>,
    cutoff_hour: u32,
    period: Period,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = production_date(ts, cutoff_hour);
    match period {
        Period::Day => day_boundaries(ts, cutoff_hour),
        Period::Week => {
            let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
            let start = at_cutoff(monday, cutoff_hour);
            (start, start + Duration::days(7))
        }
        Period::Month => {
            let first = day.with_day(1).expect("day 1 always valid");
            let next = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
            }
            .expect("first of month always valid");
            (at_cutoff(first, cutoff_hour), at_cutoff(next, cutoff_hour))
        }
        Period::Year => {
            let first = NaiveDate::from_ymd_opt(day.year(), 1, 1).expect("jan 1 always valid");
            let next =
                NaiveDate::from_ymd_opt(day.year() + 1, 1, 1).expect("jan 1 always valid");
            (at_cutoff(first, cutoff_hour), at_cutoff(next, cutoff_hour))
        }
    }
}

/// Boundaries of the period immediately before the one starting at `start`.
pub fn prior_boundaries(
    start: DateTime<Utc>,
    cutoff_hour: u32,
    period: Period,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match period {
        Period::Day => (start - Duration::days(1), start),
        Period::Week => (start - Duration::days(7), start),
        // Variable-length periods: step one instant back and re-resolve.
        Period::Month | Period::Year => {
            let (prev_start, _) =
                period_boundaries(start - Duration::seconds(1), cutoff_hour, period);
            (prev_start, start)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn before_cutoff_belongs_to_previous_day() {
        // 05:30 on the 10th falls in the production day starting 06:00 on the 9th.
        let (start, end) = day_boundaries(ts(2026, 3, 10, 5, 30), 6);
        assert_eq!(start, ts(2026, 3, 9, 6, 0));
        assert_eq!(end, ts(2026, 3, 10, 6, 0));
    }

    #[test]
    fn at_and_after_cutoff_belongs_to_same_day() {
        let (start, _) = day_boundaries(ts(2026, 3, 10, 6, 0), 6);
        assert_eq!(start, ts(2026, 3, 10, 6, 0));

        let (start, end) = day_boundaries(ts(2026, 3, 10, 23, 59), 6);
        assert_eq!(start, ts(2026, 3, 10, 6, 0));
        assert_eq!(end, ts(2026, 3, 11, 6, 0));
    }

    #[test]
    fn week_starts_monday_at_cutoff() {
        // 2026-03-11 is a Wednesday; its production week starts Monday the 9th.
        let (start, end) = period_boundaries(ts(2026, 3, 11, 12, 0), 6, Period::Week);
        assert_eq!(start, ts(2026, 3, 9, 6, 0));
        assert_eq!(end, ts(2026, 3, 16, 6, 0));
    }

    #[test]
    fn early_morning_first_of_month_counts_for_previous_month() {
        let (start, end) = period_boundaries(ts(2026, 4, 1, 2, 0), 6, Period::Month);
        assert_eq!(start, ts(2026, 3, 1, 6, 0));
        assert_eq!(end, ts(2026, 4, 1, 6, 0));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (start, end) = period_boundaries(ts(2026, 12, 15, 10, 0), 6, Period::Month);
        assert_eq!(start, ts(2026, 12, 1, 6, 0));
        assert_eq!(end, ts(2027, 1, 1, 6, 0));
    }

    #[test]
    fn out_of_range_cutoff_hour_is_clamped() {
        let stamp = ts(2026, 3, 10, 5, 30);
        assert_eq!(day_boundaries(stamp, 99), day_boundaries(stamp, 23));
        assert_eq!(
            period_boundaries(stamp, 48, Period::Week),
            period_boundaries(stamp, 23, Period::Week)
        );
    }

    #[test]
    fn prior_period_abuts_current() {
        for period in [Period::Day, Period::Week, Period::Month, Period::Year] {
            let now = ts(2026, 7, 14, 15, 0);
            let (start, end) = period_boundaries(now, 6, period);
            assert!(start <= now && now < end, "{period:?}");
            let (p_start, p_end) = prior_boundaries(start, 6, period);
            assert_eq!(p_end, start, "{period:?}");
            assert!(p_start < p_end, "{period:?}");
        }
    }
}
