//! Free time spans on a resource.
//!
//! A gap is a contiguous span during which a limiting resource holds no
//! queue element. Either bound may be absent: a gap without start reaches
//! back indefinitely, one without end stays open forever.

use std::collections::BTreeSet;
use std::fmt;

use super::{Calendar, Criterion, DateAndHour, ElementKey, QueueKey, Resource, ResourceId};

/// A free span of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gap {
    resource: ResourceId,
    start: Option<DateAndHour>,
    end: Option<DateAndHour>,
}

impl Gap {
    /// Creates a gap. Bounds are not validated beyond `start <= end`, which
    /// is the caller's responsibility.
    pub fn create(
        resource: ResourceId,
        start: Option<DateAndHour>,
        end: Option<DateAndHour>,
    ) -> Self {
        debug_assert!(
            !matches!((start, end), (Some(s), Some(e)) if s > e),
            "gap start after end"
        );
        Self { resource, start, end }
    }

    /// Binds the gap to a queue.
    pub fn on_queue(self, queue: QueueKey) -> GapOnQueue {
        GapOnQueue { queue, gap: self }
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn start_time(&self) -> Option<DateAndHour> {
        self.start
    }

    pub fn end_time(&self) -> Option<DateAndHour> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_none()
    }

    /// The same gap starting at `start` instead.
    pub fn starting_at(&self, start: DateAndHour) -> Gap {
        Gap { start: Some(start), ..*self }
    }

    /// Whether `time` falls inside the gap, end excluded.
    pub fn contains(&self, time: DateAndHour) -> bool {
        self.start.map_or(true, |start| start <= time) && self.end.map_or(true, |end| time < end)
    }

    /// Workable hours of `calendar` inside the gap, `None` when the gap has
    /// no start or no end.
    pub fn hours_in_gap(&self, calendar: &Calendar) -> Option<u64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(calendar.workable_hours_between(start, end)),
            _ => None,
        }
    }

    /// Whether `hours` of work fit inside the gap.
    pub fn can_fit(&self, hours: u32, calendar: &Calendar) -> bool {
        self.hours_in_gap(calendar)
            .map_or(true, |available| available >= u64::from(hours))
    }

    /// Sub-gaps on which `resource` satisfies every criterion at once.
    ///
    /// Criterion satisfactions are date bounded; each date range where all
    /// criteria hold is intersected with the gap.
    pub fn split_into_gaps_satisfying_criteria(
        &self,
        resource: &Resource,
        criteria: &BTreeSet<Criterion>,
    ) -> Vec<Gap> {
        resource
            .ranges_satisfying(criteria)
            .into_iter()
            .filter_map(|range| {
                let start = self.start.max(range.start.map(DateAndHour::from_date));
                let end = match (self.end, range.end.map(DateAndHour::from_date)) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (Some(a), None) | (None, Some(a)) => Some(a),
                    (None, None) => None,
                };
                match (start, end) {
                    (Some(start), Some(end)) if start >= end => None,
                    _ => Some(Gap {
                        resource: self.resource,
                        start,
                        end,
                    }),
                }
            })
            .collect()
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(start) => write!(f, "[{start}, ")?,
            None => f.write_str("(-inf, ")?,
        }
        match self.end {
            Some(end) => write!(f, "{end})"),
            None => f.write_str("+inf)"),
        }
    }
}

/// A gap on a specific queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GapOnQueue {
    pub queue: QueueKey,
    pub gap: Gap,
}

impl GapOnQueue {
    pub fn start_time(&self) -> Option<DateAndHour> {
        self.gap.start_time()
    }

    pub fn end_time(&self) -> Option<DateAndHour> {
        self.gap.end_time()
    }

    /// Replaces the gap, keeping the queue.
    pub fn with_gap(&self, gap: Gap) -> GapOnQueue {
        GapOnQueue { queue: self.queue, gap }
    }
}

/// A gap on a queue and the element right after it, `None` for the tail gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GapOnQueueWithQueueElement {
    pub gap: GapOnQueue,
    pub element: Option<ElementKey>,
}
