//! Calendar helpers for month arithmetic.
//!
//! Records keep their dates as `"YYYY-MM-DD"` strings and their months as
//! `"YYYY-MM"` strings. These helpers parse them leniently: a malformed value
//! yields `None` and callers degrade instead of failing.

use std::fmt;

use chrono::{Datelike, NaiveDate};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A calendar month, ordered chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Builds a month from a year and a 1-based month number.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Parses a `"YYYY-MM"` string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (year, month) = value.trim().split_once('-')?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.month
    }

    /// Returns the month `months` after this one.
    #[must_use]
    pub fn plus_months(self, months: u32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    #[must_use]
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Number of days in the month (28..=31).
    #[must_use]
    pub fn last_day(self) -> u32 {
        self.plus_months(1)
            .first_day()
            .and_then(|next| next.pred_opt())
            .map_or(28, |last| last.day())
    }

    /// Returns the date on `day` of this month, clamped to the month length.
    #[must_use]
    pub fn clamped_date(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day.clamp(1, self.last_day()))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parses a `"YYYY-MM-DD"` date.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Derives the `"YYYY-MM"` month of a date string (its first 7 characters).
#[must_use]
pub fn month_of(date: &str) -> String {
    date.trim().chars().take(7).collect()
}
