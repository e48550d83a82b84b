//! Allocation policies.
//!
//! - **non-appropriative**: the element takes free time only, nothing else
//!   moves.
//! - **appropriative**: the element takes the requested time; colliding
//!   elements and everything depending on the moved elements are reinserted
//!   at their earliest valid gaps.
//! - **automatic**: the element and its successors are reinserted at their
//!   earliest valid gaps.
//!
//! Policies that move more than one element run on a copy of the state
//! taken beforehand, restored if any element cannot be placed.

use std::collections::BTreeSet;

use tracing::{debug, instrument, warn};

use super::LimitingResourceAllocator;
use crate::error::{Error, Result};
use crate::models::{DateAndHour, ElementKey, GapOnQueue, InsertedElement, Interval, QueueKey};
use crate::queues::QueuesState;

impl QueuesState {
    /// Span the element would take on `queue` starting at `time`.
    fn checked_span(
        &self,
        key: ElementKey,
        queue: QueueKey,
        time: DateAndHour,
    ) -> Result<Interval> {
        let element = self.element(key)?;
        let limiting = self.queue(queue)?;
        if !self.get_assignable_queues(key)?.contains(&queue) {
            return Err(Error::QueueNotAssignable {
                element: element.id(),
                queue: limiting.id(),
            });
        }
        let calendar = &self.resource(limiting.resource())?.calendar;
        let end = LimitingResourceAllocator::new(self).end_time_for(
            time,
            element.intended_hours(),
            calendar,
        )?;
        Interval::new(time, end)
    }

    fn inserted(&self, key: ElementKey) -> Result<InsertedElement> {
        let element = self.element(key)?;
        match (element.queue(), element.span()) {
            (Some(queue), Some(interval)) => Ok(InsertedElement {
                queue,
                interval,
                element: key,
                id: element.id(),
            }),
            _ => Err(Error::NoValidGap(element.id())),
        }
    }

    /// Places an element at `time` on `queue` without moving any other.
    ///
    /// Fails with [`Error::Collision`] if the span overlaps an element of
    /// the queue other than itself.
    #[instrument(skip(self))]
    pub fn non_appropriative_allocation(
        &mut self,
        key: ElementKey,
        queue: QueueKey,
        time: DateAndHour,
    ) -> Result<Vec<InsertedElement>> {
        let span = self.checked_span(key, queue, time)?;
        let limiting = self.queue(queue)?;
        if let Some((other, _)) = limiting.colliding(span).find(|(other, _)| *other != key) {
            return Err(Error::Collision {
                element: self.element(key)?.id(),
                queue: limiting.id(),
                at: time,
                with: self.element(other)?.id(),
            });
        }

        self.unassign_from_queue(key)?;
        self.assigned_to_queue(key, queue, span)?;
        debug!(element = %key, %queue, %span, "allocated in gap");
        Ok(vec![self.inserted(key)?])
    }

    /// Places an element at `time` on `queue`, displacing whatever is in
    /// the way.
    ///
    /// Displaced elements, and the assigned successors of the element and of
    /// every displaced one, are reinserted in dependency order at their
    /// earliest valid gaps. If one of them cannot be placed the state is
    /// left as it was and [`Error::CascadeFailed`] names it.
    #[instrument(skip(self))]
    pub fn appropriative_allocation(
        &mut self,
        key: ElementKey,
        queue: QueueKey,
        time: DateAndHour,
    ) -> Result<BTreeSet<InsertedElement>> {
        let span = self.checked_span(key, queue, time)?;
        let saved = self.clone();

        match self.appropriate(key, queue, span) {
            Ok(inserted) => {
                debug!(element = %key, inserted = inserted.len(), "appropriative allocation done");
                Ok(inserted)
            }
            Err(err) => {
                warn!(element = %key, error = %err, "appropriative allocation rolled back");
                *self = saved;
                Err(err)
            }
        }
    }

    fn appropriate(
        &mut self,
        key: ElementKey,
        queue: QueueKey,
        span: Interval,
    ) -> Result<BTreeSet<InsertedElement>> {
        let id = self.element(key)?.id();
        self.unassign_from_queue(key)?;

        let displaced: Vec<ElementKey> = self
            .queue(queue)?
            .colliding(span)
            .map(|(each, _)| each)
            .collect();

        let mut roots = displaced.clone();
        roots.push(key);
        let reachable: Vec<ElementKey> = self
            .dependency_graph()
            .reachable_from(roots)
            .into_iter()
            .collect();
        let to_reinsert: Vec<ElementKey> = self
            .in_topological_order(&reachable)?
            .into_iter()
            .filter(|&each| {
                each != key
                    && (displaced.contains(&each)
                        || self.element(each).is_ok_and(|e| !e.is_detached()))
            })
            .collect();

        for &each in &to_reinsert {
            self.unassign_from_queue(each)?;
        }
        self.assigned_to_queue(key, queue, span)?;
        debug!(element = %key, %queue, %span, displaced = displaced.len(), "allocated over queue");

        let mut inserted = BTreeSet::from([self.inserted(key)?]);
        for each in to_reinsert {
            match self.insert_at_earliest(each) {
                Ok(placed) => {
                    inserted.insert(placed);
                }
                Err(Error::NoValidGap(failed)) => {
                    return Err(Error::CascadeFailed {
                        element: id,
                        displaced: failed,
                    })
                }
                Err(err) => return Err(err),
            }
        }
        Ok(inserted)
    }

    /// Places an unassigned element at its earliest valid gap over every
    /// queue it may go to.
    fn insert_at_earliest(&mut self, key: ElementKey) -> Result<InsertedElement> {
        let (queue, span) = {
            let element = self.element(key)?;
            let allocator = LimitingResourceAllocator::new(self);
            let since = element.earliest_start_because_of_gantt();

            let mut best: Option<(DateAndHour, GapOnQueue)> = None;
            for queue in self.get_assignable_queues(key)? {
                let Some(gap) = allocator.get_first_valid_gap(key, queue, since)? else {
                    continue;
                };
                let Some(start) = gap.start_time() else {
                    continue;
                };
                if best.map_or(true, |(current, _)| start < current) {
                    best = Some((start, gap));
                }
            }

            let (start, gap) = best.ok_or(Error::NoValidGap(element.id()))?;
            let calendar = &self.resource(self.queue(gap.queue)?.resource())?.calendar;
            let end = allocator.end_time_for(start, element.intended_hours(), calendar)?;
            (gap.queue, Interval::new(start, end)?)
        };

        self.assigned_to_queue(key, queue, span)?;
        debug!(element = %key, %queue, %span, "inserted at earliest gap");
        self.inserted(key)
    }

    /// Reinserts an element and its assigned successors at their earliest
    /// valid gaps, in dependency order.
    ///
    /// Fails with [`Error::NoValidGap`] for the first element that cannot be
    /// placed, leaving the state as it was.
    #[instrument(skip(self))]
    pub fn assign_automatically(&mut self, key: ElementKey) -> Result<Vec<InsertedElement>> {
        let saved = self.clone();
        let result: Result<Vec<InsertedElement>> = self
            .get_insertions_to_be_done_for(key)
            .and_then(|order| {
                order
                    .into_iter()
                    .map(|each| self.insert_at_earliest(each))
                    .collect()
            });

        if let Err(err) = &result {
            warn!(element = %key, error = %err, "automatic allocation rolled back");
            *self = saved;
        }
        result
    }

    /// Takes an element off its queue. Its successors stay where they are.
    #[instrument(skip(self))]
    pub fn unschedule(&mut self, key: ElementKey) -> Result<()> {
        self.unassign_from_queue(key)?;
        debug!(element = %key, "unscheduled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationConfig;
    use crate::models::{
        Calendar, ElementId, QueueDependencyType, Resource, ResourceAllocation, ResourceId,
    };
    use crate::queues::fixtures::*;
    use crate::queues::{ElementSnapshot, QueueSnapshot, QueuesSnapshot};
    use assert_matches::assert_matches;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn placed(inserted: &[InsertedElement]) -> Vec<(ElementId, Interval)> {
        inserted.iter().map(|each| (each.id, each.interval)).collect()
    }

    #[test]
    fn test_non_appropriative_leaves_others_alone() {
        let mut state = abc_state();
        let c = key(&state, 3);

        let inserted = state.non_appropriative_allocation(c, QueueKey(0), at(1, 16)).unwrap();
        assert_eq!(placed(&inserted), vec![(ElementId(3), span(at(1, 16), at(1, 20)))]);
        assert_eq!(span_of(&state, 1), Some(span(at(1, 8), at(1, 16))));
        assert_eq!(span_of(&state, 2), Some(span(at(2, 8), at(2, 16))));
        assert_consistent(&state);
    }

    #[test]
    fn test_non_appropriative_rejects_collision() {
        let mut state = abc_state();
        let c = key(&state, 3);

        assert_matches!(
            state.non_appropriative_allocation(c, QueueKey(0), at(1, 14)),
            Err(Error::Collision { with: ElementId(1), .. })
        );
        assert!(state.is_unassigned(c));
        assert_consistent(&state);
    }

    #[test]
    fn test_non_appropriative_moves_assigned_element() {
        let mut state = abc_state();
        let a = key(&state, 1);

        // Overlapping its own span is not a collision.
        let inserted = state.non_appropriative_allocation(a, QueueKey(0), at(1, 10)).unwrap();
        assert_eq!(placed(&inserted), vec![(ElementId(1), span(at(1, 10), at(1, 18)))]);
        assert_eq!(state.queue(QueueKey(0)).unwrap().len(), 2);
        assert_consistent(&state);
    }

    #[test]
    fn test_non_appropriative_rejects_foreign_queue() {
        let snapshot = abc_snapshot()
            .with_resource(Resource::machine(2))
            .with_queue(QueueSnapshot::new(20, ResourceId(2)));
        let mut state = QueuesState::from_snapshot(&snapshot, AllocationConfig::default()).unwrap();
        let c = key(&state, 3);

        assert_matches!(
            state.non_appropriative_allocation(c, QueueKey(1), at(1, 0)),
            Err(Error::QueueNotAssignable { element: ElementId(3), .. })
        );
        assert_matches!(
            state.non_appropriative_allocation(ElementKey(42), QueueKey(0), at(1, 0)),
            Err(Error::UnknownElement(_))
        );
    }

    #[test]
    fn test_appropriative_example_cascade() {
        let mut state = abc_state();
        let c = key(&state, 3);

        let inserted = state.appropriative_allocation(c, QueueKey(0), at(1, 10)).unwrap();

        assert_eq!(span_of(&state, 3), Some(span(at(1, 10), at(1, 14))));
        assert_eq!(span_of(&state, 1), Some(span(at(1, 14), at(1, 22))));
        assert_eq!(span_of(&state, 2), Some(span(at(1, 22), at(2, 6))));

        let ids: BTreeSet<_> = inserted.iter().map(|each| each.id).collect();
        assert_eq!(ids, BTreeSet::from([ElementId(1), ElementId(2), ElementId(3)]));
        assert!(inserted.iter().all(|each| each.queue == QueueKey(0)));
        assert_consistent(&state);
    }

    #[test]
    fn test_appropriative_on_free_time_moves_nothing_else() {
        let mut state = abc_state();
        let c = key(&state, 3);

        let inserted = state.appropriative_allocation(c, QueueKey(0), at(3, 0)).unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(span_of(&state, 1), Some(span(at(1, 8), at(1, 16))));
        assert_eq!(span_of(&state, 2), Some(span(at(2, 8), at(2, 16))));
    }

    #[test]
    fn test_appropriative_restores_state_on_failure() {
        // Only 16 workable hours exist on the resource, all of them taken.
        let scarce = Calendar::workweek("scarce", 0)
            .with_exception(day(1), 8)
            .with_exception(day(2), 8);
        let snapshot = QueuesSnapshot::new()
            .with_resource(Resource::machine(1).with_calendar(scarce))
            .with_queue(
                QueueSnapshot::new(10, ResourceId(1))
                    .with_element(on_machine(1, 8, at(1, 0)).with_span(span(at(1, 0), at(1, 8))))
                    .with_element(on_machine(2, 8, at(1, 0)).with_span(span(at(2, 0), at(2, 8)))),
            )
            .with_unassigned(on_machine(3, 4, at(1, 0)));
        let config = AllocationConfig::default().with_horizon_days(30);
        let mut state = QueuesState::from_snapshot(&snapshot, config).unwrap();
        let c = key(&state, 3);

        assert_matches!(
            state.appropriative_allocation(c, QueueKey(0), at(1, 0)),
            Err(Error::CascadeFailed {
                element: ElementId(3),
                displaced: ElementId(1),
            })
        );
        assert!(state.is_unassigned(c));
        assert_eq!(span_of(&state, 1), Some(span(at(1, 0), at(1, 8))));
        assert_eq!(span_of(&state, 2), Some(span(at(2, 0), at(2, 8))));
        assert_consistent(&state);
    }

    #[test]
    fn test_automatic_assignment() {
        let mut state = abc_state();
        let c = key(&state, 3);

        let inserted = state.assign_automatically(c).unwrap();
        assert_eq!(placed(&inserted), vec![(ElementId(3), span(at(1, 16), at(1, 20)))]);

        // A and B are compacted against their Gantt start.
        let a = key(&state, 1);
        let inserted = state.assign_automatically(a).unwrap();
        assert_eq!(
            placed(&inserted),
            vec![
                (ElementId(1), span(at(1, 8), at(1, 16))),
                (ElementId(2), span(at(1, 20), at(2, 4))),
            ]
        );
        assert_consistent(&state);
    }

    #[test]
    fn test_automatic_assignment_without_gap() {
        let snapshot = abc_snapshot()
            .with_resource(Resource::machine(2).with_calendar(Calendar::workweek("never", 0)))
            .with_queue(QueueSnapshot::new(20, ResourceId(2)))
            .with_unassigned(ElementSnapshot::new(
                4,
                ResourceAllocation::specific(ResourceId(2), 2),
                at(1, 0),
            ));
        let config = AllocationConfig::default().with_horizon_days(14);
        let mut state = QueuesState::from_snapshot(&snapshot, config).unwrap();
        let d = key(&state, 4);

        assert_matches!(state.assign_automatically(d), Err(Error::NoValidGap(ElementId(4))));
        assert!(state.is_unassigned(d));
        assert_consistent(&state);
    }

    #[test]
    fn test_unschedule() {
        let mut state = abc_state();
        let a = key(&state, 1);

        state.unschedule(a).unwrap();
        assert!(state.is_unassigned(a));
        assert_eq!(span_of(&state, 2), Some(span(at(2, 8), at(2, 16))));
        state.unschedule(a).unwrap();
        assert_consistent(&state);
    }

    /// Every dependency between assigned elements holds, except those
    /// entering `skip`.
    fn assert_dependencies_hold(state: &QueuesState, skip: ElementKey) {
        for (origin, destination, dependency) in state.dependency_graph().edges() {
            if destination == skip {
                continue;
            }
            let (Some(from), Some(to)) =
                (span_of_key(state, origin), span_of_key(state, destination))
            else {
                continue;
            };
            let bound = dependency.origin_time(&from);
            if dependency.modifies_destination_start() {
                assert!(to.start() >= bound, "{dependency:?}");
            } else {
                assert!(to.end() >= bound, "{dependency:?}");
            }
        }
    }

    fn span_of_key(state: &QueuesState, key: ElementKey) -> Option<Interval> {
        state.element(key).unwrap().span()
    }

    #[test]
    fn test_random_appropriative_cascades_keep_invariants() {
        use QueueDependencyType::*;
        let kinds = [StartStart, EndStart, EndEnd, StartEnd];
        let mut rng = SmallRng::seed_from_u64(17);

        for _ in 0..40 {
            let count: u64 = rng.random_range(3..10);
            let mut queue = QueueSnapshot::new(10, ResourceId(1));
            let mut cursor = at(1, 0);
            for id in 1..=count {
                let hours: u32 = rng.random_range(1..12);
                let delay: u32 = rng.random_range(0..6);
                let start =
                    DateAndHour::normalized(cursor.date(), u32::from(cursor.hour()) + delay);
                let end = DateAndHour::normalized(start.date(), u32::from(start.hour()) + hours);
                let element = on_machine(id, hours, at(1, 0)).with_span(span(start, end));
                queue = queue.with_element(element);
                cursor = end;
            }

            let mut snapshot = QueuesSnapshot::new()
                .with_resource(Resource::machine(1))
                .with_queue(queue)
                .with_unassigned(on_machine(count + 1, rng.random_range(1..10), at(1, 0)));
            for origin in 1..=count {
                for destination in origin + 1..=count {
                    if rng.random_bool(0.3) {
                        let kind = kinds[rng.random_range(0..kinds.len())];
                        snapshot = snapshot.with_dependency(
                            ElementId(origin),
                            ElementId(destination),
                            kind,
                        );
                    }
                }
            }
            if rng.random_bool(0.5) {
                let destination = ElementId(rng.random_range(1..=count));
                snapshot = snapshot.with_dependency(ElementId(count + 1), destination, EndStart);
            }

            let mut state =
                QueuesState::from_snapshot(&snapshot, AllocationConfig::default()).unwrap();
            let moved = key(&state, rng.random_range(1..=count + 1));
            let time = at(1, 0).max(DateAndHour::normalized(day(1), rng.random_range(0..48)));

            let inserted = state.appropriative_allocation(moved, QueueKey(0), time).unwrap();
            assert_consistent(&state);
            assert_dependencies_hold(&state, moved);
            assert!(inserted
                .iter()
                .any(|each| each.element == moved && each.interval.start() == time));
            for each in &inserted {
                assert_eq!(state.element(each.element).unwrap().span(), Some(each.interval));
            }
        }
    }
}
