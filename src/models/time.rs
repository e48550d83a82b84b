//! Day + hour time positions and half-open intervals.
//!
//! # Time Model
//! A `DateAndHour` is a calendar date plus an hour in `0..=23`. The hour is a
//! position inside that date's workable hours: a calendar day with capacity
//! `c` exposes workable hours `[0, c)`. With an always-available calendar
//! (capacity 24) this coincides with clock hours.
//!
//! There is no sub-hour resolution.

use std::fmt;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A date plus an hour of that date.
///
/// Ordered by date first, then by hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateAndHour", into = "RawDateAndHour")]
pub struct DateAndHour {
    date: NaiveDate,
    hour: u8,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawDateAndHour {
    date: NaiveDate,
    hour: u8,
}

impl TryFrom<RawDateAndHour> for DateAndHour {
    type Error = Error;

    fn try_from(raw: RawDateAndHour) -> Result<Self> {
        DateAndHour::new(raw.date, raw.hour)
    }
}

impl From<DateAndHour> for RawDateAndHour {
    fn from(value: DateAndHour) -> Self {
        Self {
            date: value.date,
            hour: value.hour,
        }
    }
}

impl DateAndHour {
    /// Creates a position, rejecting hours outside `0..=23`.
    pub fn new(date: NaiveDate, hour: u8) -> Result<Self> {
        if hour > 23 {
            return Err(Error::InvalidHour(hour));
        }
        Ok(Self { date, hour })
    }

    /// The first hour of `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self { date, hour: 0 }
    }

    /// Builds a position from an hour that may have reached the end of the
    /// day; hour 24 rolls over to hour 0 of the next date.
    pub(crate) fn normalized(date: NaiveDate, hour: u32) -> Self {
        if hour < 24 {
            return Self {
                date,
                hour: hour as u8,
            };
        }
        match date.succ_opt() {
            Some(next) => Self {
                date: next,
                hour: (hour - 24).min(23) as u8,
            },
            None => Self { date, hour: 23 },
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    #[inline]
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    #[inline]
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Whether this position is after the first hour of `date`.
    pub fn is_after_date(&self, date: NaiveDate) -> bool {
        *self > Self::from_date(date)
    }

    /// Latest of the present values, `None` if every value is absent.
    pub fn max_of<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<Self>>,
    {
        values.into_iter().flatten().max()
    }

    /// Earliest of the present values, `None` if every value is absent.
    pub fn min_of<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<Self>>,
    {
        values.into_iter().flatten().min()
    }

    /// Lazily yields the dates from this position's date while `end` is after
    /// them. Without an end the iterator only stops at the last representable
    /// date.
    pub fn days_until(&self, end: Option<DateAndHour>) -> impl Iterator<Item = NaiveDate> {
        std::iter::successors(Some(self.date), |date| date.succ_opt())
            .take_while(move |date| end.map_or(true, |end| end.is_after_date(*date)))
    }

    /// The same hour `years` years later, `None` on date overflow.
    pub fn plus_years(&self, years: u32) -> Option<Self> {
        let date = self.date.checked_add_months(Months::new(years.checked_mul(12)?))?;
        Some(Self {
            date,
            hour: self.hour,
        })
    }
}

impl fmt::Display for DateAndHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}h", self.date, self.hour)
    }
}

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: DateAndHour,
    end: DateAndHour,
}

impl Interval {
    /// Creates an interval, rejecting `start > end`.
    pub fn new(start: DateAndHour, end: DateAndHour) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateAndHour {
        self.start
    }

    pub fn end(&self) -> DateAndHour {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `time` lies in `[start, end)`.
    pub fn contains(&self, time: DateAndHour) -> bool {
        self.start <= time && time < self.end
    }

    /// Whether any hour of `date` lies in the interval.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        let day_start = DateAndHour::from_date(date);
        let day_end = date
            .succ_opt()
            .map(DateAndHour::from_date)
            .unwrap_or(DateAndHour { date, hour: 23 });
        self.start < day_end && day_start < self.end
    }

    /// Whether `other` lies completely inside this interval.
    pub fn includes(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two intervals share at least one hour.
    ///
    /// An empty interval overlaps a non-empty one that strictly contains its
    /// position, so zero-length placements still collide with an element
    /// running through them.
    pub fn overlaps_with(&self, other: &Interval) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (false, false) => self.start < other.end && other.start < self.end,
            (true, false) => other.start < self.start && self.start < other.end,
            (false, true) => self.start < other.start && other.start < self.end,
            (true, true) => false,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(d: u32, hour: u8) -> DateAndHour {
        DateAndHour::new(day(d), hour).unwrap()
    }

    #[test]
    fn test_ordering_date_then_hour() {
        assert!(at(1, 23).is_before(&at(2, 0)));
        assert!(at(2, 5).is_after(&at(2, 4)));
        assert_eq!(at(3, 7).cmp(&at(3, 7)), Ordering::Equal);
    }

    #[test]
    fn test_invalid_hour_rejected() {
        assert!(matches!(
            DateAndHour::new(day(1), 24),
            Err(Error::InvalidHour(24))
        ));
    }

    #[test]
    fn test_normalized_rolls_over_midnight() {
        assert_eq!(DateAndHour::normalized(day(1), 24), at(2, 0));
        assert_eq!(DateAndHour::normalized(day(1), 8), at(1, 8));
    }

    #[test]
    fn test_max_and_min_ignore_absent_values() {
        assert_eq!(
            DateAndHour::max_of([None, Some(at(1, 3)), Some(at(2, 1))]),
            Some(at(2, 1))
        );
        assert_eq!(DateAndHour::min_of([None, Some(at(4, 3))]), Some(at(4, 3)));
        assert_eq!(DateAndHour::max_of([None, None]), None);
    }

    #[test]
    fn test_days_until() {
        let days: Vec<_> = at(1, 5).days_until(Some(at(3, 0))).collect();
        assert_eq!(days, vec![day(1), day(2)]);

        let days: Vec<_> = at(1, 5).days_until(Some(at(3, 1))).collect();
        assert_eq!(days, vec![day(1), day(2), day(3)]);

        assert_eq!(at(1, 0).days_until(None).take(10).count(), 10);
    }

    #[test]
    fn test_plus_years() {
        let later = at(1, 6).plus_years(10).unwrap();
        assert_eq!(later.date(), NaiveDate::from_ymd_opt(2034, 3, 1).unwrap());
        assert_eq!(later.hour(), 6);
    }

    #[test]
    fn test_interval_containment_and_overlap() {
        let a = Interval::new(at(1, 8), at(1, 16)).unwrap();
        let b = Interval::new(at(1, 16), at(2, 8)).unwrap();
        let inner = Interval::new(at(1, 10), at(1, 12)).unwrap();

        assert!(a.contains(at(1, 8)));
        assert!(!a.contains(at(1, 16))); // exclusive end
        assert!(!a.overlaps_with(&b)); // touching
        assert!(a.overlaps_with(&inner));
        assert!(a.includes(&inner));
        assert!(!inner.includes(&a));
        assert!(a.contains_date(day(1)));
        assert!(!a.contains_date(day(2)));
        assert!(b.contains_date(day(2)));
    }

    #[test]
    fn test_empty_interval_overlap() {
        let a = Interval::new(at(1, 8), at(1, 16)).unwrap();
        let inside = Interval::new(at(1, 10), at(1, 10)).unwrap();
        let at_start = Interval::new(at(1, 8), at(1, 8)).unwrap();
        assert!(inside.overlaps_with(&a));
        assert!(a.overlaps_with(&inside));
        assert!(!at_start.overlaps_with(&a));
    }

    #[test]
    fn test_interval_rejects_reversed_bounds() {
        assert!(Interval::new(at(2, 0), at(1, 0)).is_err());
    }

    #[test]
    fn test_serde_validates_hour() {
        let ok: DateAndHour = serde_json::from_str(r#"{"date":"2024-03-01","hour":8}"#).unwrap();
        assert_eq!(ok, at(1, 8));
        let bad = serde_json::from_str::<DateAndHour>(r#"{"date":"2024-03-01","hour":30}"#);
        assert!(bad.is_err());
    }
}
