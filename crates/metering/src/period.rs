//! Calendar periods for usage counters
//!
//! A counter belongs to the period containing its `period_start`. It stays
//! current only while "now" falls in that same period. All periods are
//! computed in UTC; weeks follow ISO 8601 and start on Monday.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// Counter granularity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Period {
    /// One counter per UTC day
    #[default]
    Daily,
    /// One counter per ISO week
    Weekly,
    /// One counter per calendar month
    Monthly,
}

impl Period {
    /// Start of the period containing `at`
    pub fn start_of(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = at.date_naive();
        let first_day = match self {
            Self::Daily => date,
            Self::Weekly => {
                let back = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(chrono::Days::new(back)).unwrap_or(date)
            }
            Self::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
        };
        first_day.and_time(NaiveTime::MIN).and_utc()
    }

    /// Whether a counter opened at `opened` still accepts usage at `now`
    pub fn is_current(&self, opened: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.start_of(opened) == self.start_of(now)
    }

    /// Period name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_yesterday_is_stale() {
        let now = at(2026, 3, 10, 0);
        assert!(!Period::Daily.is_current(at(2026, 3, 9, 23), now));
        assert!(Period::Daily.is_current(at(2026, 3, 10, 0), at(2026, 3, 10, 23)));
    }

    #[test]
    fn test_daily_same_day_other_year_is_stale() {
        assert!(!Period::Daily.is_current(at(2025, 3, 10, 12), at(2026, 3, 10, 12)));
    }

    #[test]
    fn test_monthly_earlier_same_month_is_current() {
        let now = at(2026, 3, 31, 22);
        assert!(Period::Monthly.is_current(at(2026, 3, 1, 0), now));
        assert!(!Period::Monthly.is_current(at(2026, 2, 28, 23), now));
        assert!(!Period::Monthly.is_current(at(2025, 3, 15, 0), now));
    }

    #[test]
    fn test_weekly_starts_monday() {
        // 2026-03-09 is a Monday
        assert_eq!(Period::Weekly.start_of(at(2026, 3, 15, 18)), at(2026, 3, 9, 0));
        assert_eq!(Period::Weekly.start_of(at(2026, 3, 9, 0)), at(2026, 3, 9, 0));
        assert!(!Period::Weekly.is_current(at(2026, 3, 8, 23), at(2026, 3, 9, 1)));
    }

    #[test]
    fn test_weekly_spans_year_boundary() {
        // 2025-12-31 and 2026-01-01 share ISO week 2026-W01
        assert!(Period::Weekly.is_current(at(2025, 12, 31, 10), at(2026, 1, 1, 10)));
        assert!(!Period::Daily.is_current(at(2025, 12, 31, 10), at(2026, 1, 1, 10)));
        assert!(!Period::Monthly.is_current(at(2025, 12, 31, 10), at(2026, 1, 1, 10)));
    }

    #[test]
    fn test_start_of_floors_to_midnight() {
        assert_eq!(Period::Daily.start_of(at(2026, 3, 10, 17)), at(2026, 3, 10, 0));
        assert_eq!(Period::Monthly.start_of(at(2026, 3, 10, 17)), at(2026, 3, 1, 0));
    }
}
