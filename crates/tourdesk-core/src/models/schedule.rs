//! Recurring schedule model
//!
//! A schedule repeats one session every week on a fixed weekday and local
//! start time. Sessions are published from it a few weeks ahead, and an
//! optional repeat limit caps how many it ever publishes.

use super::session::{check_seats_and_cost, SessionDraft};
use crate::error::AppError;
use crate::AppResult;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stored weekday numbers, Sunday first
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Weekly session template of an excursion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSchedule {
    pub id: i64,
    pub excursion_id: i64,

    /// 0 = Sunday .. 6 = Saturday
    pub weekday: i16,

    /// Wall-clock start in the display timezone
    pub start_time: NaiveTime,

    pub max_participants: i32,
    pub cost: Decimal,

    /// Total sessions to publish, 0 for no limit
    pub repeats: i32,

    /// Sessions published so far
    pub count_of_repeats: i32,
}

impl RecurringSchedule {
    pub fn weekday(&self) -> Option<Weekday> {
        usize::try_from(self.weekday)
            .ok()
            .and_then(|i| WEEKDAYS.get(i).copied())
    }

    /// Sessions this schedule may still publish, `None` when unlimited
    pub fn remaining(&self) -> Option<usize> {
        (self.repeats > 0).then(|| (self.repeats - self.count_of_repeats).max(0) as usize)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Start instants on the schedule's weekday from `from` through
    /// `from + horizon_days`, both ends included.
    ///
    /// A local time that does not exist in `tz` (a DST gap) is skipped; an
    /// ambiguous one takes the earlier instant.
    pub fn occurrences(&self, from: NaiveDate, horizon_days: u32, tz: Tz) -> Vec<DateTime<Utc>> {
        let Some(weekday) = self.weekday() else {
            return Vec::new();
        };

        from.iter_days()
            .take(horizon_days as usize + 1)
            .filter(|day| day.weekday() == weekday)
            .filter_map(|day| tz.from_local_datetime(&day.and_time(self.start_time)).earliest())
            .map(|local| local.with_timezone(&Utc))
            .collect()
    }

    /// Starts to publish out of `candidates`
    ///
    /// Starts the excursion already has a session at are skipped and do not
    /// use up a repeat. Publication stops at the repeat limit.
    pub fn plan(
        &self,
        candidates: &[DateTime<Utc>],
        existing: &HashSet<DateTime<Utc>>,
    ) -> Vec<DateTime<Utc>> {
        let budget = self.remaining().unwrap_or(usize::MAX);
        candidates
            .iter()
            .filter(|start| !existing.contains(start))
            .take(budget)
            .copied()
            .collect()
    }

    /// Session published at `start_at`
    pub fn session_draft(&self, start_at: DateTime<Utc>) -> SessionDraft {
        SessionDraft {
            start_at,
            max_participants: self.max_participants,
            cost: self.cost,
        }
    }
}

/// Validated input for a new schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDraft {
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub max_participants: i32,
    pub cost: Decimal,
    pub repeats: i32,
}

impl ScheduleDraft {
    /// `start_time` is `HH:MM` or `HH:MM:SS`. Capacity and cost follow the
    /// session rules.
    pub fn parse(
        weekday: i16,
        start_time: &str,
        max_participants: i32,
        cost: Decimal,
        repeats: i32,
    ) -> AppResult<Self> {
        if !(0..=6).contains(&weekday) {
            return Err(AppError::Validation(format!(
                "weekday must be 0 (Sunday) to 6 (Saturday), got {}",
                weekday
            )));
        }

        let raw = start_time.trim();
        let start_time = NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|e| {
                AppError::Validation(format!("invalid start time '{}': {}", start_time, e))
            })?;

        let cost = check_seats_and_cost(max_participants, cost)?;

        if repeats < 0 {
            return Err(AppError::Validation(format!(
                "repeats must be >= 0, got {}",
                repeats
            )));
        }

        Ok(Self {
            weekday,
            start_time,
            max_participants,
            cost,
            repeats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rust_decimal_macros::dec;

    fn schedule(weekday: i16, repeats: i32, count_of_repeats: i32) -> RecurringSchedule {
        RecurringSchedule {
            id: 1,
            excursion_id: 1,
            weekday,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            max_participants: 12,
            cost: dec!(800),
            repeats,
            count_of_repeats,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekday_numbering_starts_on_sunday() {
        assert_eq!(schedule(0, 0, 0).weekday(), Some(Weekday::Sun));
        assert_eq!(schedule(1, 0, 0).weekday(), Some(Weekday::Mon));
        assert_eq!(schedule(6, 0, 0).weekday(), Some(Weekday::Sat));
        assert_eq!(schedule(7, 0, 0).weekday(), None);
    }

    #[test]
    fn test_four_week_horizon() {
        // 2026-06-01 is a Monday
        let starts = schedule(1, 0, 0).occurrences(day(2026, 6, 1), 28, chrono_tz::Europe::Moscow);

        assert_eq!(starts.len(), 5);
        assert_eq!(starts[0].to_rfc3339(), "2026-06-01T07:00:00+00:00");
        assert_eq!(starts[4].date_naive(), day(2026, 6, 29));
        assert!(starts.iter().all(|s| s.hour() == 7));

        let sundays = schedule(0, 0, 0).occurrences(day(2026, 6, 1), 28, chrono_tz::Europe::Moscow);
        assert_eq!(sundays.len(), 4);
        assert_eq!(sundays[0].date_naive(), day(2026, 6, 7));
    }

    #[test]
    fn test_plan_skips_existing_and_respects_limit() {
        let starts = schedule(1, 0, 0).occurrences(day(2026, 6, 1), 28, chrono_tz::UTC);
        let existing: HashSet<_> = [starts[1]].into_iter().collect();

        let unlimited = schedule(1, 0, 0).plan(&starts, &existing);
        assert_eq!(unlimited.len(), 4);
        assert!(!unlimited.contains(&starts[1]));

        let capped = schedule(1, 5, 3).plan(&starts, &existing);
        assert_eq!(capped, vec![starts[0], starts[2]]);

        let spent = schedule(1, 5, 5);
        assert!(spent.is_exhausted());
        assert!(spent.plan(&starts, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_draft_parse() {
        let draft = ScheduleDraft::parse(3, "09:30", 20, dec!(1200), 0).unwrap();
        assert_eq!(draft.start_time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());

        let draft = ScheduleDraft::parse(3, "18:45:00", 20, dec!(0), 10).unwrap();
        assert_eq!(draft.repeats, 10);
    }

    #[test]
    fn test_draft_rejects_bad_input() {
        for bad in [
            ScheduleDraft::parse(7, "09:30", 20, dec!(0), 0),
            ScheduleDraft::parse(-1, "09:30", 20, dec!(0), 0),
            ScheduleDraft::parse(1, "half past nine", 20, dec!(0), 0),
            ScheduleDraft::parse(1, "09:30", -2, dec!(0), 0),
            ScheduleDraft::parse(1, "09:30", 20, dec!(1000000000), 0),
            ScheduleDraft::parse(1, "09:30", 20, dec!(0), -1),
        ] {
            assert!(matches!(bad, Err(AppError::Validation(_))));
        }
    }
}
