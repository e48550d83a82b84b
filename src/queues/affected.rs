//! Impact view of an insertion.
//!
//! Before committing an insertion, callers can ask which assigned elements
//! may shift: the assigned elements reachable from the inserted one through
//! dependencies, plus, per queue, every element after the earliest affected
//! one, linked in queue order.

use std::collections::{BTreeMap, BTreeSet};

use super::QueuesState;
use crate::error::Result;
use crate::models::{DateAndHour, ElementKey, QueueDependencyType, QueueKey};

/// Why one element may push another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AffectedEdgeKind {
    Dependency(QueueDependencyType),
    /// The destination follows the origin on the same queue.
    InsertionOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AffectedEdge {
    pub origin: ElementKey,
    pub destination: ElementKey,
    pub kind: AffectedEdgeKind,
}

/// Directed multigraph over assigned elements: a pair may be linked both by
/// a dependency and by insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffectedGraph {
    vertices: BTreeSet<ElementKey>,
    edges: Vec<AffectedEdge>,
}

impl AffectedGraph {
    fn add_vertex(&mut self, vertex: ElementKey) {
        self.vertices.insert(vertex);
    }

    /// Endpoints are added first so no edge dangles.
    fn add_edge(&mut self, origin: ElementKey, destination: ElementKey, kind: AffectedEdgeKind) {
        self.add_vertex(origin);
        self.add_vertex(destination);
        self.edges.push(AffectedEdge {
            origin,
            destination,
            kind,
        });
    }

    pub fn vertices(&self) -> impl Iterator<Item = ElementKey> + '_ {
        self.vertices.iter().copied()
    }

    pub fn contains_vertex(&self, vertex: ElementKey) -> bool {
        self.vertices.contains(&vertex)
    }

    pub fn edges(&self) -> &[AffectedEdge] {
        &self.edges
    }

    pub fn outgoing(&self, vertex: ElementKey) -> impl Iterator<Item = &AffectedEdge> + '_ {
        self.edges.iter().filter(move |e| e.origin == vertex)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl QueuesState {
    /// Assigned elements an insertion of `key` may displace.
    pub fn get_potentially_affected_by_insertion(&self, key: ElementKey) -> Result<AffectedGraph> {
        self.element(key)?;
        let on_queues: BTreeSet<ElementKey> = self
            .dependency_graph()
            .reachable_from([key])
            .into_iter()
            .filter(|&each| self.element(each).is_ok_and(|e| !e.is_detached()))
            .collect();

        let mut result = AffectedGraph::default();
        for &origin in &on_queues {
            result.add_vertex(origin);
            for (destination, dependency) in self.dependency_graph().outgoing(origin) {
                if on_queues.contains(&destination) {
                    let kind = AffectedEdgeKind::Dependency(dependency.kind);
                    result.add_edge(origin, destination, kind);
                }
            }
        }

        let mut earliest: BTreeMap<QueueKey, (DateAndHour, ElementKey)> = BTreeMap::new();
        for element in on_queues.iter().filter_map(|&each| self.element(each).ok()) {
            if let (Some(queue), Some(start)) = (element.queue(), element.start_time()) {
                let candidate = (start, element.key());
                earliest
                    .entry(queue)
                    .and_modify(|current| *current = (*current).min(candidate))
                    .or_insert(candidate);
            }
        }

        for (queue, (_, first)) in earliest {
            let mut previous = first;
            for each in self.queue(queue)?.elements_after(first) {
                result.add_edge(previous, each, AffectedEdgeKind::InsertionOrder);
                previous = each;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationConfig;
    use crate::models::{ElementId, Resource, ResourceId};
    use crate::queues::fixtures::*;
    use crate::queues::{QueueSnapshot, QueuesSnapshot};

    #[test]
    fn test_affected_by_moving_first_element() {
        let state = abc_state();
        let (a, b) = (key(&state, 1), key(&state, 2));

        let affected = state.get_potentially_affected_by_insertion(a).unwrap();
        assert_eq!(affected.vertices().collect::<Vec<_>>(), vec![a, b]);

        let mut edges = affected.edges().to_vec();
        edges.sort();
        assert_eq!(
            edges,
            vec![
                AffectedEdge {
                    origin: a,
                    destination: b,
                    kind: AffectedEdgeKind::Dependency(QueueDependencyType::EndStart),
                },
                AffectedEdge {
                    origin: a,
                    destination: b,
                    kind: AffectedEdgeKind::InsertionOrder,
                },
            ]
        );
    }

    #[test]
    fn test_detached_element_only_drags_queue_order() {
        // C (unassigned) -> B: B and everything after it on the queue.
        let snapshot = abc_snapshot()
            .with_dependency(ElementId(3), ElementId(2), QueueDependencyType::EndStart);
        let state = QueuesState::from_snapshot(&snapshot, AllocationConfig::default()).unwrap();
        let (b, c) = (key(&state, 2), key(&state, 3));

        let affected = state.get_potentially_affected_by_insertion(c).unwrap();
        assert!(!affected.contains_vertex(c));
        assert_eq!(affected.vertices().collect::<Vec<_>>(), vec![b]);
        assert!(affected.edges().is_empty());
    }

    #[test]
    fn test_insertion_order_pulls_in_later_elements() {
        // B depends on nothing; moving B still shifts whatever follows it.
        let snapshot = QueuesSnapshot::new()
            .with_resource(Resource::machine(1))
            .with_queue(
                QueueSnapshot::new(10, ResourceId(1))
                    .with_element(on_machine(1, 2, at(1, 0)).with_span(span(at(1, 0), at(1, 2))))
                    .with_element(on_machine(2, 2, at(1, 0)).with_span(span(at(1, 2), at(1, 4))))
                    .with_element(on_machine(3, 2, at(1, 0)).with_span(span(at(1, 4), at(1, 6)))),
            );
        let state = QueuesState::from_snapshot(&snapshot, AllocationConfig::default()).unwrap();
        let (first, second, third) = (key(&state, 1), key(&state, 2), key(&state, 3));

        let affected = state.get_potentially_affected_by_insertion(second).unwrap();
        assert!(!affected.contains_vertex(first));
        assert_eq!(affected.vertices().collect::<Vec<_>>(), vec![second, third]);
        assert_eq!(affected.outgoing(second).count(), 1);
        assert!(affected.edges().iter().all(|e| e.kind == AffectedEdgeKind::InsertionOrder));
    }
}
