//! Resource working calendar.
//!
//! Defines how many hours a resource can work on each date: a capacity
//! per weekday plus per-date exceptions (holidays, partial days).
//!
//! # Hour Model
//! A date with capacity `c` exposes the workable hours `[0, c)` of that date.
//! Positions (`DateAndHour`) are interpreted against those hours, so an
//! element starting at hour `h` of a date with capacity `c` can use
//! `c - h` hours of it.
//!
//! # Precedence
//! Exceptions override the weekly capacity.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::DateAndHour;

/// Hours in a fully workable day.
pub const FULL_DAY: u8 = 24;

/// Workable hours per date for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Calendar identifier.
    pub id: String,
    /// Capacity (hours) indexed by weekday, Monday first.
    pub weekly_capacity: [u8; 7],
    /// Per-date capacities overriding the weekly pattern.
    pub exceptions: BTreeMap<NaiveDate, u8>,
}

impl Calendar {
    /// Creates a calendar with every day fully workable.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            weekly_capacity: [FULL_DAY; 7],
            exceptions: BTreeMap::new(),
        }
    }

    /// Creates a calendar that is always available.
    pub fn always_available(id: impl Into<String>) -> Self {
        Self::new(id)
    }

    /// Monday to Friday with `hours` each, weekends off.
    pub fn workweek(id: impl Into<String>, hours: u8) -> Self {
        let hours = hours.min(FULL_DAY);
        Self {
            id: id.into(),
            weekly_capacity: [hours, hours, hours, hours, hours, 0, 0],
            exceptions: BTreeMap::new(),
        }
    }

    /// Sets the capacity of a weekday.
    pub fn with_weekday(mut self, weekday: Weekday, hours: u8) -> Self {
        self.weekly_capacity[weekday.num_days_from_monday() as usize] = hours.min(FULL_DAY);
        self
    }

    /// Overrides the capacity of a single date.
    pub fn with_exception(mut self, date: NaiveDate, hours: u8) -> Self {
        self.exceptions.insert(date, hours.min(FULL_DAY));
        self
    }

    /// Makes a date non-workable.
    pub fn with_holiday(self, date: NaiveDate) -> Self {
        self.with_exception(date, 0)
    }

    /// Workable hours on `date`.
    pub fn capacity_on(&self, date: NaiveDate) -> u8 {
        self.exceptions
            .get(&date)
            .copied()
            .unwrap_or(self.weekly_capacity[date.weekday().num_days_from_monday() as usize])
    }

    /// Whether `date` has any workable hour.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.capacity_on(date) > 0
    }

    /// Total workable hours in `[start, end)`.
    pub fn workable_hours_between(&self, start: DateAndHour, end: DateAndHour) -> u64 {
        if end <= start {
            return 0;
        }
        start
            .days_until(Some(end))
            .map(|date| {
                let capacity = u32::from(self.capacity_on(date));
                let lower = if date == start.date() {
                    u32::from(start.hour())
                } else {
                    0
                };
                let upper = if date == end.date() {
                    u32::from(end.hour())
                } else {
                    u32::from(FULL_DAY)
                };
                u64::from(upper.min(capacity).saturating_sub(lower.min(capacity)))
            })
            .sum()
    }

    /// Position reached after working `hours` from `start`.
    ///
    /// Returns `None` if the hours cannot be completed within `horizon_days`.
    pub fn end_after(
        &self,
        start: DateAndHour,
        hours: u32,
        horizon_days: u32,
    ) -> Option<DateAndHour> {
        let mut remaining = hours;
        let mut date = start.date();
        let mut hour = u32::from(start.hour());

        for _ in 0..=horizon_days {
            let available = u32::from(self.capacity_on(date)).saturating_sub(hour);
            if remaining <= available {
                return Some(DateAndHour::normalized(date, hour + remaining));
            }
            remaining -= available;
            date = date.succ_opt()?;
            hour = 0;
        }

        None
    }

    /// Latest position from which `hours` of work finish by `end`.
    ///
    /// Walks the calendar backwards from `end`. Returns `None` if the result
    /// would precede `not_before` or no such position exists within
    /// `horizon_days`.
    pub fn start_before(
        &self,
        end: DateAndHour,
        hours: u32,
        not_before: Option<DateAndHour>,
        horizon_days: u32,
    ) -> Option<DateAndHour> {
        let mut remaining = hours;
        let mut date = end.date();
        let mut upper = u32::from(end.hour());

        for _ in 0..=horizon_days {
            let available = upper.min(u32::from(self.capacity_on(date)));
            if remaining <= available {
                let candidate = DateAndHour::normalized(date, available - remaining);
                return match not_before {
                    Some(floor) if candidate < floor => None,
                    _ => Some(candidate),
                };
            }
            remaining -= available;
            date = date.pred_opt()?;
            if not_before.is_some_and(|floor| date < floor.date()) {
                return None;
            }
            upper = u32::from(FULL_DAY);
        }

        None
    }
}
