//! Resource model.
//!
//! Limiting resources are workers or machines that process one queue
//! element at a time. Each resource has a type, a working calendar and a set
//! of criteria it satisfies during (possibly bounded) date intervals.
//!
//! # Criteria
//! A generic allocation asks for "any resource of this type satisfying these
//! criteria". Satisfaction is time-bounded: a worker may hold a certificate
//! only from a given date on. A resource is a candidate if, at some point in
//! time, it satisfies every required criterion simultaneously.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Calendar;

/// Resource identifier assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A limiting resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: ResourceId,
    /// Human-readable name.
    pub name: String,
    /// Resource classification.
    pub resource_type: ResourceType,
    /// Workable hours per date.
    pub calendar: Calendar,
    /// Criteria satisfied by this resource, with their validity.
    pub satisfactions: Vec<CriterionSatisfaction>,
}

/// Resource type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Worker,
    Machine,
}

/// A named criterion (skill, certificate, machine capability...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Criterion(pub String);

impl Criterion {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A criterion held by a resource on the dates `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionSatisfaction {
    pub criterion: Criterion,
    pub start: NaiveDate,
    /// `None` = satisfied indefinitely.
    pub end: Option<NaiveDate>,
}

/// A range of dates `[start, end)`; absent bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| start <= date) && self.end.map_or(true, |end| date < end)
    }

    fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start >= end)
    }

    /// Common part of two ranges, if any.
    fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = min_end(self.end, other.end);
        let result = DateRange { start, end };
        (!result.is_empty()).then_some(result)
    }
}

/// Earliest of two exclusive ends, `None` meaning "never ends".
fn min_end(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// Whether `end` reaches at least `date`, `None` meaning "never ends".
fn reaches(end: Option<NaiveDate>, date: NaiveDate) -> bool {
    end.map_or(true, |end| end >= date)
}

impl Resource {
    /// Creates a resource with an always-available calendar.
    pub fn new(id: ResourceId, resource_type: ResourceType) -> Self {
        Self {
            id,
            name: String::new(),
            resource_type,
            calendar: Calendar::always_available(format!("resource-{}", id.0)),
            satisfactions: Vec::new(),
        }
    }

    /// Creates a worker.
    pub fn worker(id: u64) -> Self {
        Self::new(ResourceId(id), ResourceType::Worker)
    }

    /// Creates a machine.
    pub fn machine(id: u64) -> Self {
        Self::new(ResourceId(id), ResourceType::Machine)
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the working calendar.
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Adds a criterion satisfied on `[start, end)`.
    pub fn with_criterion(
        mut self,
        criterion: impl Into<String>,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Self {
        self.satisfactions.push(CriterionSatisfaction {
            criterion: Criterion::new(criterion),
            start,
            end,
        });
        self
    }

    /// Whether `criterion` is satisfied on `date`.
    pub fn satisfies_at(&self, criterion: &Criterion, date: NaiveDate) -> bool {
        self.satisfactions.iter().any(|s| {
            &s.criterion == criterion && s.start <= date && s.end.map_or(true, |end| date < end)
        })
    }

    /// Merged, ordered date ranges on which `criterion` is satisfied.
    fn ranges_for(&self, criterion: &Criterion) -> Vec<DateRange> {
        let mut satisfactions: Vec<_> = self
            .satisfactions
            .iter()
            .filter(|s| &s.criterion == criterion)
            .filter(|s| s.end.map_or(true, |end| s.start < end))
            .collect();
        satisfactions.sort_by_key(|s| s.start);

        let mut merged: Vec<DateRange> = Vec::new();
        for s in satisfactions {
            match merged.last_mut() {
                Some(last) if reaches(last.end, s.start) => {
                    last.end = match (last.end, s.end) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    };
                }
                _ => merged.push(DateRange {
                    start: Some(s.start),
                    end: s.end,
                }),
            }
        }
        merged
    }

    /// Date ranges on which every criterion of `criteria` holds at once.
    ///
    /// An empty criteria set is satisfied always.
    ///
    /// # Algorithm
    /// Per criterion, merge its satisfactions into ordered disjoint ranges,
    /// then intersect the range lists pairwise with a two-pointer sweep.
    pub fn ranges_satisfying(&self, criteria: &BTreeSet<Criterion>) -> Vec<DateRange> {
        let mut result = vec![DateRange::unbounded()];
        for criterion in criteria {
            let ranges = self.ranges_for(criterion);
            let mut next = Vec::new();
            let (mut i, mut j) = (0, 0);
            while i < result.len() && j < ranges.len() {
                if let Some(common) = result[i].intersection(&ranges[j]) {
                    next.push(common);
                }
                // Advance whichever range ends first.
                let left_end = result[i].end;
                let right_end = ranges[j].end;
                match (left_end, right_end) {
                    (Some(a), Some(b)) if a <= b => i += 1,
                    (Some(_), None) => i += 1,
                    _ => j += 1,
                }
            }
            result = next;
            if result.is_empty() {
                break;
            }
        }
        result
    }

    /// Whether the resource satisfies all `criteria` at some point in time.
    pub fn satisfies_criteria_at_some_point(&self, criteria: &BTreeSet<Criterion>) -> bool {
        !self.ranges_satisfying(criteria).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn criteria(names: &[&str]) -> BTreeSet<Criterion> {
        names.iter().map(|n| Criterion::new(*n)).collect()
    }

    #[test]
    fn test_resource_builder() {
        let r = Resource::worker(7)
            .with_name("Alice")
            .with_calendar(Calendar::workweek("office", 8))
            .with_criterion("welding", day(1), None);

        assert_eq!(r.id, ResourceId(7));
        assert_eq!(r.name, "Alice");
        assert_eq!(r.resource_type, ResourceType::Worker);
        assert_eq!(r.calendar.capacity_on(day(4)), 8);
        assert!(r.satisfies_at(&Criterion::new("welding"), day(20)));
        let before = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        assert!(!r.satisfies_at(&Criterion::new("welding"), before));
    }

    #[test]
    fn test_empty_criteria_always_satisfied() {
        let r = Resource::machine(1);
        assert_eq!(r.ranges_satisfying(&BTreeSet::new()), vec![DateRange::unbounded()]);
        assert!(r.satisfies_criteria_at_some_point(&BTreeSet::new()));
    }

    #[test]
    fn test_overlapping_satisfactions_intersect() {
        let r = Resource::worker(1)
            .with_criterion("a", day(1), Some(day(10)))
            .with_criterion("b", day(5), Some(day(20)));

        assert_eq!(
            r.ranges_satisfying(&criteria(&["a", "b"])),
            vec![DateRange {
                start: Some(day(5)),
                end: Some(day(10))
            }]
        );
        assert!(r.satisfies_criteria_at_some_point(&criteria(&["a", "b"])));
    }

    #[test]
    fn test_disjoint_satisfactions_never_hold_together() {
        let r = Resource::worker(1)
            .with_criterion("a", day(1), Some(day(5)))
            .with_criterion("b", day(5), None);

        assert!(r.satisfies_criteria_at_some_point(&criteria(&["a"])));
        assert!(r.satisfies_criteria_at_some_point(&criteria(&["b"])));
        assert!(!r.satisfies_criteria_at_some_point(&criteria(&["a", "b"])));
        assert!(!r.satisfies_criteria_at_some_point(&criteria(&["missing"])));
    }

    #[test]
    fn test_adjacent_satisfactions_are_merged() {
        let r = Resource::worker(1)
            .with_criterion("a", day(1), Some(day(5)))
            .with_criterion("a", day(5), Some(day(8)))
            .with_criterion("a", day(20), None);

        assert_eq!(
            r.ranges_satisfying(&criteria(&["a"])),
            vec![
                DateRange {
                    start: Some(day(1)),
                    end: Some(day(8))
                },
                DateRange {
                    start: Some(day(20)),
                    end: None
                },
            ]
        );
    }

    #[test]
    fn test_date_range_contains() {
        let range = DateRange {
            start: Some(day(2)),
            end: Some(day(4)),
        };
        assert!(range.contains(day(2)));
        assert!(range.contains(day(3)));
        assert!(!range.contains(day(4)));
        assert!(DateRange::unbounded().contains(day(1)));
    }
}
