//! Placement of limiting resource queue elements.
//!
//! The allocator answers "where can this element go" questions against a
//! read-only [`QueuesState`]: the valid gaps of a queue, the earliest and
//! latest start inside a gap and the time a user-picked day stands for.
//! The policies that mutate the state live in [`policies`].
//!
//! # Calendar Walks
//! Durations are workable hours of the resource's calendar. Ends are found
//! walking the calendar forward from a start, latest starts walking it
//! backward from a gap end. Walks give up after
//! [`AllocationConfig::horizon_days`](crate::config::AllocationConfig).

mod policies;

use chrono::NaiveDate;
use tracing::trace;

use crate::error::{Error, Result};
use crate::models::{
    Calendar, DateAndHour, ElementKey, Gap, GapOnQueue, QueueKey, Resource, ResourceAllocation,
};
use crate::queues::{InsertionRequirements, QueuesState};

/// How the start of an allocation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationTime {
    /// The start of the selected gap.
    Earliest,
    /// The latest start still finishing inside the selected gap.
    Latest,
    /// A day picked by the user.
    Day(NaiveDate),
}

/// Gap search and placement times over a queues state.
#[derive(Debug, Clone, Copy)]
pub struct LimitingResourceAllocator<'a> {
    state: &'a QueuesState,
}

impl<'a> LimitingResourceAllocator<'a> {
    pub fn new(state: &'a QueuesState) -> Self {
        Self { state }
    }

    fn horizon_days(&self) -> u32 {
        self.state.config().horizon_days
    }

    /// End of `hours` workable hours starting at `start`.
    pub fn end_time_for(
        &self,
        start: DateAndHour,
        hours: u32,
        calendar: &Calendar,
    ) -> Result<DateAndHour> {
        calendar
            .end_after(start, hours, self.horizon_days())
            .ok_or(Error::HorizonExceeded {
                from: start,
                days: self.horizon_days(),
            })
    }

    /// Latest start from which the allocation completes by the gap end.
    ///
    /// `None` when the gap has no end or is too small.
    pub fn start_time_to_allocate_starting_from_end(
        &self,
        allocation: &ResourceAllocation,
        resource: &Resource,
        gap: &Gap,
    ) -> Option<DateAndHour> {
        let end = gap.end_time()?;
        resource.calendar.start_before(
            end,
            allocation.intended_hours(),
            gap.start_time(),
            self.horizon_days(),
        )
    }

    /// Latest start per gap, see
    /// [`start_time_to_allocate_starting_from_end`](Self::start_time_to_allocate_starting_from_end).
    pub fn end_allocation_dates(
        &self,
        allocation: &ResourceAllocation,
        resource: &Resource,
        gaps: &[GapOnQueue],
    ) -> Vec<Option<DateAndHour>> {
        gaps.iter()
            .map(|each| {
                self.start_time_to_allocate_starting_from_end(allocation, resource, &each.gap)
            })
            .collect()
    }

    /// Narrows a gap to where the element would start, if it fits.
    ///
    /// The start is the later of the gap start and the earliest possible
    /// start. If the element would then end before its earliest possible
    /// end, it starts later so that it ends right on it.
    fn fit(
        &self,
        gap: Gap,
        requirements: &InsertionRequirements,
        calendar: &Calendar,
    ) -> Option<Gap> {
        let hours = requirements.intended_hours();
        let floor = requirements.earliest_possible_start();
        let horizon = self.horizon_days();

        let mut start = gap.start_time().map_or(floor, |s| s.max(floor));
        let mut end = calendar.end_after(start, hours, horizon)?;
        let earliest_end = requirements.earliest_possible_end();
        if end < earliest_end {
            if let Some(later) = calendar.start_before(earliest_end, hours, Some(start), horizon) {
                start = later;
                end = calendar.end_after(start, hours, horizon)?;
            }
        }

        let fits = gap.end_time().map_or(true, |gap_end| end <= gap_end);
        fits.then(|| gap.starting_at(start))
    }

    /// Gaps of `queue` from `since` on where the element fits, each
    /// narrowed to the element's start.
    pub fn get_valid_gaps_for_element_since(
        &self,
        key: ElementKey,
        queue: QueueKey,
        since: DateAndHour,
    ) -> Result<Vec<GapOnQueue>> {
        let element = self.state.element(key)?;
        if !self.state.get_assignable_queues(key)?.contains(&queue) {
            return Err(Error::QueueNotAssignable {
                element: element.id(),
                queue: self.state.queue(queue)?.id(),
            });
        }
        let limiting = self.state.queue(queue)?;
        let resource = self.state.resource(limiting.resource())?;
        let requirements = self.state.get_requirements_for(key, Some(since))?;

        let mut result = Vec::new();
        for each in limiting.gaps_with_queue_elements_since(Some(since)) {
            let candidates = match element.allocation().criteria() {
                Some(criteria) => {
                    each.gap.gap.split_into_gaps_satisfying_criteria(resource, criteria)
                }
                None => vec![each.gap.gap],
            };
            for gap in candidates {
                match self.fit(gap, &requirements, &resource.calendar) {
                    Some(valid) => {
                        trace!(element = %element.id(), gap = %valid, "valid gap");
                        result.push(valid.on_queue(queue));
                    }
                    None => trace!(element = %element.id(), %gap, "element does not fit"),
                }
            }
        }
        Ok(result)
    }

    /// First gap of `queue` from `since` on where the element fits.
    pub fn get_first_valid_gap(
        &self,
        key: ElementKey,
        queue: QueueKey,
        since: DateAndHour,
    ) -> Result<Option<GapOnQueue>> {
        Ok(self
            .get_valid_gaps_for_element_since(key, queue, since)?
            .into_iter()
            .next())
    }

    /// Maps a picked day to a start inside `gap`.
    ///
    /// The day of the gap start and the day of `end_allocation` map to those
    /// exact times; days in between map to their first hour. Days outside
    /// the range, or any day when a bounded gap has no latest start, give
    /// `None`.
    pub fn get_valid_day_in_gap(
        date: NaiveDate,
        gap: &Gap,
        end_allocation: Option<DateAndHour>,
    ) -> Option<DateAndHour> {
        if gap.end_time().is_some() && end_allocation.is_none() {
            return None;
        }
        if let Some(start) = gap.start_time().filter(|s| s.date() == date) {
            return Some(start);
        }
        if let Some(end) = end_allocation.filter(|e| e.date() == date) {
            return Some(end);
        }

        let after_start = gap.start_time().map_or(true, |s| s.date() <= date);
        let before_end = end_allocation.map_or(true, |e| date <= e.date());
        (after_start && before_end).then(|| DateAndHour::from_date(date))
    }

    /// The start selected by `choice`.
    ///
    /// Appropriative allocations may pick any day not before the element's
    /// Gantt start. Everything else needs a gap.
    pub fn allocation_time(
        &self,
        key: ElementKey,
        gap: Option<&GapOnQueue>,
        choice: AllocationTime,
        appropriative: bool,
    ) -> Result<DateAndHour> {
        let element = self.state.element(key)?;

        if let (true, AllocationTime::Day(date)) = (appropriative, choice) {
            if date < element.earliest_start_because_of_gantt().date() {
                return Err(Error::InvalidDay(date));
            }
            return Ok(DateAndHour::from_date(date));
        }

        let gap = gap.ok_or(Error::MissingGap)?;
        let latest = || -> Result<Option<DateAndHour>> {
            let resource = self.state.resource(self.state.queue(gap.queue)?.resource())?;
            Ok(self.start_time_to_allocate_starting_from_end(
                element.allocation(),
                resource,
                &gap.gap,
            ))
        };

        match choice {
            AllocationTime::Earliest => gap.start_time().ok_or(Error::MissingGap),
            AllocationTime::Latest => {
                if gap.end_time().is_none() {
                    return Err(Error::UnboundedGap);
                }
                latest()?.ok_or(Error::NoValidGap(element.id()))
            }
            AllocationTime::Day(date) => {
                Self::get_valid_day_in_gap(date, &gap.gap, latest()?).ok_or(Error::InvalidDay(date))
            }
        }
    }
}
