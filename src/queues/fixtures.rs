//! Shared test data.

use chrono::NaiveDate;

use super::{ElementSnapshot, QueueSnapshot, QueuesSnapshot, QueuesState};
use crate::config::AllocationConfig;
use crate::models::{
    DateAndHour, ElementId, ElementKey, Interval, QueueDependencyType, Resource, ResourceAllocation,
    ResourceId,
};

/// Day `d` of March 2024. The 4th is a Monday.
pub(crate) fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

pub(crate) fn at(d: u32, hour: u8) -> DateAndHour {
    DateAndHour::new(day(d), hour).unwrap()
}

pub(crate) fn span(from: DateAndHour, to: DateAndHour) -> Interval {
    Interval::new(from, to).unwrap()
}

pub(crate) fn on_machine(id: u64, hours: u32, gantt_start: DateAndHour) -> ElementSnapshot {
    ElementSnapshot::new(id, ResourceAllocation::specific(ResourceId(1), hours), gantt_start)
}

/// Machine 1 (always available) with queue 10 holding A = #1 on
/// [1 08h, 1 16h) and B = #2 on [2 08h, 2 16h), B depending end-start on A.
/// C = #3 is unassigned and needs 4 hours. Every Gantt start is 1 08h.
pub(crate) fn abc_snapshot() -> QueuesSnapshot {
    QueuesSnapshot::new()
        .with_resource(Resource::machine(1).with_name("Lathe"))
        .with_queue(
            QueueSnapshot::new(10, ResourceId(1))
                .with_element(on_machine(1, 8, at(1, 8)).with_span(span(at(1, 8), at(1, 16))))
                .with_element(on_machine(2, 8, at(1, 8)).with_span(span(at(2, 8), at(2, 16)))),
        )
        .with_unassigned(on_machine(3, 4, at(1, 8)))
        .with_dependency(ElementId(1), ElementId(2), QueueDependencyType::EndStart)
}

pub(crate) fn abc_state() -> QueuesState {
    QueuesState::from_snapshot(&abc_snapshot(), AllocationConfig::default()).unwrap()
}

pub(crate) fn key(state: &QueuesState, id: u64) -> ElementKey {
    state.get_equivalent(ElementId(id)).unwrap()
}

pub(crate) fn span_of(state: &QueuesState, id: u64) -> Option<Interval> {
    state.element(key(state, id)).unwrap().span()
}

/// Every element is on exactly one queue or unassigned, and no queue has
/// overlapping elements.
pub(crate) fn assert_consistent(state: &QueuesState) {
    for element in state.elements() {
        let on_queues = state
            .queues()
            .iter()
            .filter(|q| q.contains(element.key()))
            .count();
        let unassigned = state.is_unassigned(element.key());
        assert_eq!(on_queues + usize::from(unassigned), 1, "element {}", element.id());
        assert_eq!(element.is_detached(), unassigned);
        assert!(state.dependency_graph().contains_vertex(element.key()));
        assert_eq!(state.get_equivalent(element.id()), Some(element.key()));
    }
    for queue in state.queues() {
        let spans: Vec<_> = queue.elements().map(|(_, s)| s).collect();
        for pair in spans.windows(2) {
            assert!(!pair[0].overlaps_with(&pair[1]), "overlap on {}", queue.id());
        }
    }
}
