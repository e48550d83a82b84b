//! What a queue element needs from a gap.

use crate::models::{DateAndHour, ElementKey, Gap, QueueElement};

/// Placement floors of a queue element.
///
/// The earliest possible start is the latest of the Gantt start, an
/// optional caller supplied start and the origin times of every dependency
/// constraining the element's start. The earliest possible end is the latest
/// of the Gantt end and the origin times of every dependency constraining
/// the element's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionRequirements {
    element: ElementKey,
    intended_hours: u32,
    earliest_possible_start: DateAndHour,
    earliest_possible_end: DateAndHour,
}

impl InsertionRequirements {
    /// Builds the requirements from the origin times of the dependencies
    /// constraining the element's start and end.
    pub fn for_element<S, E>(
        element: &QueueElement,
        start_floors: S,
        end_floors: E,
        start_at: Option<DateAndHour>,
    ) -> Self
    where
        S: IntoIterator<Item = DateAndHour>,
        E: IntoIterator<Item = DateAndHour>,
    {
        let gantt_start = element.earliest_start_because_of_gantt();
        let earliest_possible_start = start_floors
            .into_iter()
            .chain(start_at)
            .fold(gantt_start, DateAndHour::max);
        let earliest_possible_end = end_floors
            .into_iter()
            .fold(element.earliest_end_because_of_gantt(), DateAndHour::max);

        Self {
            element: element.key(),
            intended_hours: element.intended_hours(),
            earliest_possible_start,
            earliest_possible_end,
        }
    }

    pub fn element(&self) -> ElementKey {
        self.element
    }

    pub fn intended_hours(&self) -> u32 {
        self.intended_hours
    }

    pub fn earliest_possible_start(&self) -> DateAndHour {
        self.earliest_possible_start
    }

    pub fn earliest_possible_end(&self) -> DateAndHour {
        self.earliest_possible_end
    }

    /// Whether the gap could hold the element: it has no end, or both
    /// floors leave room before its end.
    pub fn is_potentially_valid(&self, gap: &Gap) -> bool {
        match gap.end_time() {
            None => true,
            Some(end) => self.earliest_possible_start < end && self.earliest_possible_end <= end,
        }
    }
}
