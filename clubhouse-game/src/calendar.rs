//! Fixed in-game calendar.
//!
//! The game uses calendar-accurate month lengths without leap years. A
//! [`CalendarDate`] carries its own year counter, which only moves when
//! December is crossed; the school-year counter in
//! [`crate::progress::GameProgress`] is tracked separately and advances at
//! year-end.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{DAYS_PER_MONTH, SEASON_START_DAY, SEASON_START_MONTH};

/// Number of days in `month` (1-based). Out-of-range months report zero.
#[must_use]
pub fn days_in_month(month: u8) -> u8 {
    usize::from(month)
        .checked_sub(1)
        .and_then(|idx| DAYS_PER_MONTH.get(idx).copied())
        .unwrap_or(0)
}

/// A day on the fixed calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDate {
    pub year: u32,
    pub month: u8,
    pub day: u8,
}

/// Result of moving a date forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarAdvance {
    pub date: CalendarDate,
    /// Month boundaries crossed along the way.
    pub months_crossed: u32,
    /// December boundaries crossed along the way.
    pub years_crossed: u32,
}

impl CalendarDate {
    #[must_use]
    pub const fn new(year: u32, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// First day of a season (4/1) in the given year.
    #[must_use]
    pub const fn season_start(year: u32) -> Self {
        Self::new(year, SEASON_START_MONTH, SEASON_START_DAY)
    }

    /// Whether the month and day exist on the fixed calendar.
    #[must_use]
    pub fn is_valid(self) -> bool {
        (1..=12).contains(&self.month) && self.day >= 1 && self.day <= days_in_month(self.month)
    }

    /// Move forward `days` days, carrying into later months and years.
    #[must_use]
    pub fn advance_days(self, days: u32) -> CalendarAdvance {
        let mut date = self;
        let mut remaining = days;
        let mut months_crossed = 0;
        let mut years_crossed = 0;
        while remaining > 0 {
            let month_len = u32::from(days_in_month(date.month));
            let left_in_month = month_len.saturating_sub(u32::from(date.day));
            if remaining <= left_in_month {
                date.day += u8::try_from(remaining).unwrap_or(0);
                remaining = 0;
            } else {
                remaining -= left_in_month + 1;
                let rolled = date.first_of_next_month();
                months_crossed += 1;
                if rolled.year != date.year {
                    years_crossed += 1;
                }
                date = rolled;
            }
        }
        CalendarAdvance {
            date,
            months_crossed,
            years_crossed,
        }
    }

    /// Day 1 of the following month.
    #[must_use]
    pub const fn first_of_next_month(self) -> Self {
        if self.month >= 12 {
            Self::new(self.year + 1, 1, 1)
        } else {
            Self::new(self.year, self.month + 1, 1)
        }
    }

    /// Days from this date up to (not including) day 1 of the next month.
    #[must_use]
    pub fn days_until_next_month(self) -> u32 {
        u32::from(days_in_month(self.month)).saturating_sub(u32::from(self.day)) + 1
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y{} {:02}/{:02}", self.year, self.month, self.day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_one_days_from_april_first_lands_on_may_second() {
        let start = CalendarDate::season_start(1);
        let advance = start.advance_days(31);
        assert_eq!(advance.date, CalendarDate::new(1, 5, 2));
        assert_eq!(advance.months_crossed, 1);
        assert_eq!(advance.years_crossed, 0);
    }

    #[test]
    fn crossing_december_carries_the_year() {
        let advance = CalendarDate::new(1, 12, 30).advance_days(3);
        assert_eq!(advance.date, CalendarDate::new(2, 1, 2));
        assert_eq!(advance.years_crossed, 1);
    }

    #[test]
    fn a_full_school_year_returns_to_april_first() {
        let advance = CalendarDate::season_start(1).advance_days(365);
        assert_eq!(advance.date, CalendarDate::season_start(2));
        assert_eq!(advance.months_crossed, 12);
    }

    #[test]
    fn zero_days_is_identity_and_month_end_rolls() {
        let date = CalendarDate::new(3, 2, 28);
        assert_eq!(date.advance_days(0).date, date);
        assert_eq!(date.advance_days(1).date, CalendarDate::new(3, 3, 1));
        assert_eq!(date.days_until_next_month(), 1);
        assert_eq!(CalendarDate::season_start(1).days_until_next_month(), 30);
    }

    #[test]
    fn validity_and_month_lengths() {
        assert!(CalendarDate::new(1, 4, 30).is_valid());
        assert!(!CalendarDate::new(1, 4, 31).is_valid());
        assert!(!CalendarDate::new(1, 13, 1).is_valid());
        assert_eq!(days_in_month(2), 28);
        assert_eq!(days_in_month(0), 0);
    }
}
