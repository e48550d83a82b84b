//! Limiting resource queue.
//!
//! A queue holds the elements assigned to one limiting resource, ordered by
//! start time. Elements on a queue never overlap; the free spans between
//! them are the queue's gaps.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    DateAndHour, ElementKey, Gap, GapOnQueue, GapOnQueueWithQueueElement, InsertedElement,
    Interval, ResourceId,
};
use crate::queues::InsertionRequirements;

/// Index of a queue inside a queues state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueKey(pub(crate) usize);

impl QueueKey {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Persistence id of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueId(pub u64);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The ordered, non-overlapping elements of one limiting resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitingResourceQueue {
    key: QueueKey,
    id: QueueId,
    resource: ResourceId,
    /// Keyed by (start, element) so that iteration follows start time.
    elements: BTreeMap<(DateAndHour, ElementKey), Interval>,
}

impl LimitingResourceQueue {
    pub(crate) fn new(key: QueueKey, id: QueueId, resource: ResourceId) -> Self {
        Self {
            key,
            id,
            resource,
            elements: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> QueueKey {
        self.key
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, element: ElementKey) -> bool {
        self.elements.keys().any(|(_, key)| *key == element)
    }

    /// Elements with their spans, by start time.
    pub fn elements(&self) -> impl Iterator<Item = (ElementKey, Interval)> + '_ {
        self.elements.iter().map(|(&(_, key), &span)| (key, span))
    }

    /// Elements following `element` in queue order.
    pub fn elements_after(&self, element: ElementKey) -> Vec<ElementKey> {
        self.elements
            .keys()
            .skip_while(|(_, key)| *key != element)
            .skip(1)
            .map(|(_, key)| *key)
            .collect()
    }

    /// First element having `time` in the middle of its span, both ends
    /// included.
    pub fn element_at(&self, time: DateAndHour) -> Option<ElementKey> {
        self.elements()
            .find(|(_, span)| span.start() <= time && time <= span.end())
            .map(|(key, _)| key)
    }

    /// Elements whose span overlaps `span`, by start time.
    pub fn colliding(&self, span: Interval) -> impl Iterator<Item = (ElementKey, Interval)> + '_ {
        self.elements()
            .take_while(move |(_, each)| each.start() <= span.end())
            .filter(move |(_, each)| each.overlaps_with(&span))
    }

    pub fn first_colliding(&self, span: &Interval) -> Option<(ElementKey, Interval)> {
        self.colliding(*span).next()
    }

    pub(crate) fn add(&mut self, element: ElementKey, span: Interval) {
        self.elements.insert((span.start(), element), span);
    }

    pub(crate) fn remove(&mut self, element: ElementKey, span: &Interval) -> bool {
        self.elements.remove(&(span.start(), element)).is_some()
    }

    /// Gaps of the queue paired with the element right after each of them.
    ///
    /// Elements are walked in start order while accumulating the end of the
    /// previous one. Every element starting at or after `since` (or every
    /// element, without `since`) that leaves free time after the previous end
    /// yields the gap before it. Earlier elements only move the previous end
    /// forward. The open-ended tail gap is always last and has no element.
    pub fn gaps_with_queue_elements_since(
        &self,
        since: Option<DateAndHour>,
    ) -> Vec<GapOnQueueWithQueueElement> {
        let mut result = Vec::new();
        let mut previous_end: Option<DateAndHour> = None;

        for (&(start, element), span) in &self.elements {
            let considered = since.map_or(true, |since| !start.is_before(&since));
            if considered && previous_end.map_or(true, |end| start.is_after(&end)) {
                let gap = Gap::create(self.resource, previous_end, Some(start));
                result.push(GapOnQueueWithQueueElement {
                    gap: gap.on_queue(self.key),
                    element: Some(element),
                });
            }
            previous_end = previous_end.max(Some(span.end()));
        }

        let tail = Gap::create(self.resource, previous_end, None);
        result.push(GapOnQueueWithQueueElement {
            gap: tail.on_queue(self.key),
            element: None,
        });
        result
    }

    /// Every gap of the queue, by start.
    pub fn gaps(&self) -> Vec<GapOnQueue> {
        self.gaps_with_queue_elements_since(None)
            .into_iter()
            .map(|each| each.gap)
            .collect()
    }

    /// Gaps that could hold the element described by `requirements`.
    pub fn gaps_potentially_valid_for(
        &self,
        requirements: &InsertionRequirements,
    ) -> Vec<GapOnQueue> {
        self.gaps()
            .into_iter()
            .filter(|each| requirements.is_potentially_valid(&each.gap))
            .collect()
    }

    /// Distinct queues touched by a set of insertions.
    pub fn queues_of<'a, I>(inserted: I) -> BTreeSet<QueueKey>
    where
        I: IntoIterator<Item = &'a InsertedElement>,
    {
        inserted.into_iter().map(|each| each.queue).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, hour: u8) -> DateAndHour {
        DateAndHour::new(NaiveDate::from_ymd_opt(2024, 3, d).unwrap(), hour).unwrap()
    }

    fn span(from: DateAndHour, to: DateAndHour) -> Interval {
        Interval::new(from, to).unwrap()
    }

    /// A [1 08h, 1 16h), B [2 08h, 2 16h)
    fn two_element_queue() -> LimitingResourceQueue {
        let mut queue = LimitingResourceQueue::new(QueueKey(0), QueueId(10), ResourceId(1));
        queue.add(ElementKey(1), span(at(2, 8), at(2, 16)));
        queue.add(ElementKey(0), span(at(1, 8), at(1, 16)));
        queue
    }

    fn bounds(
        gaps: &[GapOnQueueWithQueueElement],
    ) -> Vec<(Option<DateAndHour>, Option<DateAndHour>)> {
        gaps.iter()
            .map(|g| (g.gap.gap.start_time(), g.gap.gap.end_time()))
            .collect()
    }

    #[test]
    fn test_elements_ordered_by_start() {
        let queue = two_element_queue();
        let keys: Vec<_> = queue.elements().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![ElementKey(0), ElementKey(1)]);
        assert_eq!(queue.elements_after(ElementKey(0)), vec![ElementKey(1)]);
        assert!(queue.elements_after(ElementKey(1)).is_empty());
        assert!(queue.elements_after(ElementKey(9)).is_empty());
    }

    #[test]
    fn test_gaps_before_first_element_yield_three() {
        let queue = two_element_queue();
        let gaps = queue.gaps_with_queue_elements_since(Some(at(1, 0)));

        assert_eq!(
            bounds(&gaps),
            vec![
                (None, Some(at(1, 8))),
                (Some(at(1, 16)), Some(at(2, 8))),
                (Some(at(2, 16)), None),
            ]
        );
        assert_eq!(gaps[0].element, Some(ElementKey(0)));
        assert_eq!(gaps[1].element, Some(ElementKey(1)));
        assert_eq!(gaps[2].element, None);
    }

    #[test]
    fn test_gaps_skip_elements_before_since() {
        let queue = two_element_queue();
        let gaps = queue.gaps_with_queue_elements_since(Some(at(1, 10)));
        assert_eq!(
            bounds(&gaps),
            vec![(Some(at(1, 16)), Some(at(2, 8))), (Some(at(2, 16)), None)]
        );
    }

    #[test]
    fn test_contiguous_elements_leave_no_gap() {
        let mut queue = LimitingResourceQueue::new(QueueKey(0), QueueId(10), ResourceId(1));
        queue.add(ElementKey(0), span(at(1, 8), at(1, 16)));
        queue.add(ElementKey(1), span(at(1, 16), at(1, 20)));
        let gaps = queue.gaps();
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[1].gap.start_time(), Some(at(1, 20)));
    }

    #[test]
    fn test_empty_queue_has_one_unbounded_gap() {
        let queue = LimitingResourceQueue::new(QueueKey(0), QueueId(10), ResourceId(1));
        let gaps = queue.gaps();
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].gap.start_time().is_none());
        assert!(gaps[0].gap.end_time().is_none());
    }

    #[test]
    fn test_first_colliding() {
        let queue = two_element_queue();
        let probe = span(at(1, 10), at(1, 14));
        assert_eq!(queue.first_colliding(&probe).map(|(k, _)| k), Some(ElementKey(0)));

        let free = span(at(1, 16), at(2, 8));
        assert!(queue.first_colliding(&free).is_none());

        let both = span(at(1, 12), at(2, 9));
        assert_eq!(queue.first_colliding(&both).map(|(k, _)| k), Some(ElementKey(0)));
    }

    #[test]
    fn test_element_at_includes_both_ends() {
        let queue = two_element_queue();
        assert_eq!(queue.element_at(at(1, 8)), Some(ElementKey(0)));
        assert_eq!(queue.element_at(at(1, 16)), Some(ElementKey(0)));
        assert_eq!(queue.element_at(at(2, 12)), Some(ElementKey(1)));
        assert_eq!(queue.element_at(at(1, 20)), None);
    }

    #[test]
    fn test_remove() {
        let mut queue = two_element_queue();
        assert!(queue.remove(ElementKey(0), &span(at(1, 8), at(1, 16))));
        assert!(!queue.contains(ElementKey(0)));
        assert!(!queue.remove(ElementKey(0), &span(at(1, 8), at(1, 16))));
        assert_eq!(queue.len(), 1);
    }
}
