//! Aggregate root of the limiting resource queues.
//!
//! # Invariants
//! - Every element is exactly one vertex of the dependency graph.
//! - Every element is on exactly one queue or in the unassigned set.
//! - Id lookups (`elements_by_id`, `queues_by_id`, `queues_by_resource_id`)
//!   match the arena after every mutation. Persistence id changes must be
//!   reported through [`QueuesState::id_changed_for`] or
//!   [`QueuesState::replace_element`].
//! - The subgraph reachable from an element is checked acyclic before its
//!   successors are reinserted.
//!
//! # Identity
//! Elements are stored in an arena addressed by [`ElementKey`]. Removed
//! elements leave an empty slot; keys are never reused.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument, trace, warn};

use super::{
    DependencySnapshot, ElementSnapshot, GapsMergeSort, InsertionRequirements, QueuesSnapshot,
};
use crate::config::AllocationConfig;
use crate::error::{Error, Result};
use crate::graph::DirectedGraph;
use crate::models::{
    DateAndHour, ElementId, ElementKey, GapOnQueue, GapOnQueueWithQueueElement, Interval,
    LimitingResourceQueue, QueueDependency, QueueDependencyType, QueueElement, QueueId, QueueKey,
    Resource, ResourceAllocation, ResourceId,
};
use crate::validation::validate_snapshot;

/// Queues, unassigned elements and the dependencies between them.
#[derive(Debug, Clone)]
pub struct QueuesState {
    config: AllocationConfig,
    resources: BTreeMap<ResourceId, Resource>,
    queues: Vec<LimitingResourceQueue>,
    elements: Vec<Option<QueueElement>>,
    unassigned: BTreeSet<ElementKey>,
    graph: DirectedGraph<ElementKey, QueueDependency>,
    elements_by_id: BTreeMap<ElementId, ElementKey>,
    queues_by_id: BTreeMap<QueueId, QueueKey>,
    queues_by_resource_id: BTreeMap<ResourceId, QueueKey>,
}

impl QueuesState {
    /// Builds a state from a validated snapshot.
    ///
    /// Every element becomes a graph vertex and every dependency an edge.
    /// Duplicate dependencies on one ordered pair keep the first one.
    #[instrument(
        skip_all,
        fields(queues = snapshot.queues.len(), unassigned = snapshot.unassigned.len())
    )]
    pub fn from_snapshot(snapshot: &QueuesSnapshot, config: AllocationConfig) -> Result<Self> {
        validate_snapshot(snapshot, &config).map_err(Error::InvalidSnapshot)?;

        let mut state = Self {
            config,
            resources: snapshot
                .resources
                .iter()
                .map(|r| (r.id, r.clone()))
                .collect(),
            queues: Vec::with_capacity(snapshot.queues.len()),
            elements: Vec::new(),
            unassigned: BTreeSet::new(),
            graph: DirectedGraph::new(),
            elements_by_id: BTreeMap::new(),
            queues_by_id: BTreeMap::new(),
            queues_by_resource_id: BTreeMap::new(),
        };

        for queue in &snapshot.queues {
            let queue_key = QueueKey(state.queues.len());
            state
                .queues
                .push(LimitingResourceQueue::new(queue_key, queue.id, queue.resource));
            state.queues_by_id.insert(queue.id, queue_key);
            state.queues_by_resource_id.insert(queue.resource, queue_key);

            for element in &queue.elements {
                let key = state.push_element(element);
                if let Some(span) = element.span {
                    state.attach(key, queue_key, span);
                }
            }
        }

        for element in &snapshot.unassigned {
            state.push_element(element);
        }

        for dependency in &snapshot.dependencies {
            let origin = state.elements_by_id.get(&dependency.origin).copied();
            let destination = state.elements_by_id.get(&dependency.destination).copied();
            if let (Some(origin), Some(destination)) = (origin, destination) {
                state.add_dependency_edge(origin, destination, dependency.kind);
            }
        }

        debug!(
            elements = state.elements_by_id.len(),
            dependencies = state.graph.edge_count(),
            "queues state built"
        );
        Ok(state)
    }

    /// Adds an element to the arena, detached.
    fn push_element(&mut self, snapshot: &ElementSnapshot) -> ElementKey {
        let key = ElementKey(self.elements.len());
        self.elements.push(Some(QueueElement {
            key,
            id: snapshot.id,
            allocation: snapshot.allocation.clone(),
            queue: None,
            span: None,
            earliest_start_because_of_gantt: snapshot.earliest_start_because_of_gantt,
            earliest_end_because_of_gantt: snapshot.earliest_end_because_of_gantt,
        }));
        self.unassigned.insert(key);
        self.graph.add_vertex(key);
        self.elements_by_id.insert(snapshot.id, key);
        key
    }

    fn add_dependency_edge(
        &mut self,
        origin: ElementKey,
        destination: ElementKey,
        kind: QueueDependencyType,
    ) -> bool {
        let dependency = QueueDependency::new(origin, destination, kind);
        let added = self.graph.add_edge(origin, destination, dependency);
        if !added {
            warn!(%origin, %destination, ?kind, "ignoring duplicate or self dependency");
        }
        added
    }

    /// Moves an element from the unassigned set onto a queue.
    fn attach(&mut self, key: ElementKey, queue: QueueKey, span: Interval) {
        if let Some(Some(element)) = self.elements.get_mut(key.0) {
            element.attach(queue, span);
            self.queues[queue.0].add(key, span);
            self.unassigned.remove(&key);
        }
    }

    fn element_mut(&mut self, key: ElementKey) -> Result<&mut QueueElement> {
        self.elements
            .get_mut(key.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownElement(key))
    }

    fn is_assigned(&self, key: ElementKey) -> bool {
        self.span_of(key).is_some()
    }

    fn span_of(&self, key: ElementKey) -> Option<Interval> {
        self.elements
            .get(key.0)
            .and_then(Option::as_ref)
            .and_then(QueueElement::span)
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn element(&self, key: ElementKey) -> Result<&QueueElement> {
        self.elements
            .get(key.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownElement(key))
    }

    /// Every live element, by key.
    pub fn elements(&self) -> impl Iterator<Item = &QueueElement> {
        self.elements.iter().flatten()
    }

    /// The element currently known under a persistence id.
    pub fn get_equivalent(&self, id: ElementId) -> Option<ElementKey> {
        self.elements_by_id.get(&id).copied()
    }

    pub fn queue(&self, key: QueueKey) -> Result<&LimitingResourceQueue> {
        self.queues.get(key.0).ok_or(Error::UnknownQueue(key))
    }

    pub fn queues(&self) -> &[LimitingResourceQueue] {
        &self.queues
    }

    pub fn queue_by_id(&self, id: QueueId) -> Option<QueueKey> {
        self.queues_by_id.get(&id).copied()
    }

    pub fn queue_for_resource(&self, resource: ResourceId) -> Option<QueueKey> {
        self.queues_by_resource_id.get(&resource).copied()
    }

    /// Queues sorted by their resource's name, then resource id.
    pub fn queues_ordered_by_resource_name(&self) -> Vec<&LimitingResourceQueue> {
        let mut result: Vec<_> = self.queues.iter().collect();
        result.sort_by_key(|queue| {
            let name = self
                .resources
                .get(&queue.resource())
                .map(|r| r.name.as_str())
                .unwrap_or_default();
            (name, queue.resource())
        });
        result
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource> {
        self.resources.get(&id).ok_or(Error::UnknownResource(id))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Unassigned elements, by key.
    pub fn unassigned(&self) -> impl Iterator<Item = ElementKey> + '_ {
        self.unassigned.iter().copied()
    }

    pub fn is_unassigned(&self, key: ElementKey) -> bool {
        self.unassigned.contains(&key)
    }

    pub fn dependency_graph(&self) -> &DirectedGraph<ElementKey, QueueDependency> {
        &self.graph
    }

    pub fn incoming_dependencies(&self, key: ElementKey) -> Vec<QueueDependency> {
        self.graph.incoming(key).map(|(_, d)| *d).collect()
    }

    pub fn outgoing_dependencies(&self, key: ElementKey) -> Vec<QueueDependency> {
        self.graph.outgoing(key).map(|(_, d)| *d).collect()
    }

    /// Adds a new element to the unassigned set. A span in the snapshot is
    /// ignored.
    pub fn add_unassigned(&mut self, element: &ElementSnapshot) -> Result<ElementKey> {
        if self.elements_by_id.contains_key(&element.id) {
            return Err(Error::DuplicateElementId(element.id));
        }
        if let ResourceAllocation::Specific { resource, .. } = element.allocation {
            self.resource(resource)?;
        }
        Ok(self.push_element(element))
    }

    /// Adds a dependency between two elements.
    ///
    /// Returns `false` if the pair already had one, which is kept.
    pub fn add_dependency(
        &mut self,
        origin: ElementKey,
        destination: ElementKey,
        kind: QueueDependencyType,
    ) -> Result<bool> {
        let origin_id = self.element(origin)?.id;
        self.element(destination)?;
        if origin == destination || self.graph.reachable_from([destination]).contains(&origin) {
            return Err(Error::CycleDetected(origin_id));
        }
        Ok(self.add_dependency_edge(origin, destination, kind))
    }

    /// Records that an unassigned element was placed on `queue` at `span`.
    pub fn assigned_to_queue(
        &mut self,
        key: ElementKey,
        queue: QueueKey,
        span: Interval,
    ) -> Result<()> {
        let id = self.element(key)?.id;
        self.queue(queue)?;
        if !self.unassigned.contains(&key) {
            return Err(Error::NotUnassigned(id));
        }
        self.attach(key, queue, span);
        trace!(element = %id, %queue, %span, "assigned to queue");
        Ok(())
    }

    /// Takes an element off its queue into the unassigned set. Does nothing
    /// for an element already unassigned.
    pub fn unassign_from_queue(&mut self, key: ElementKey) -> Result<()> {
        let element = self.element_mut(key)?;
        let (Some(queue), Some(span)) = (element.queue, element.span) else {
            return Ok(());
        };
        element.detach();
        let id = element.id;
        self.queues[queue.0].remove(key, &span);
        self.unassigned.insert(key);
        trace!(element = %id, %queue, %span, "unassigned from queue");
        Ok(())
    }

    /// Drops an unassigned element from the state altogether.
    pub fn remove_unassigned(&mut self, key: ElementKey) -> Result<()> {
        let id = self.element(key)?.id;
        if !self.unassigned.remove(&key) {
            return Err(Error::NotUnassigned(id));
        }
        self.graph.remove_vertex(key);
        self.elements_by_id.remove(&id);
        self.elements[key.0] = None;
        Ok(())
    }

    /// Reconciles the id lookup after persistence changed an element's id.
    pub fn id_changed_for(&mut self, previous: ElementId, new: ElementId) -> Result<ElementKey> {
        let key = self
            .get_equivalent(previous)
            .ok_or(Error::UnknownElementId(previous))?;
        if previous == new {
            return Ok(key);
        }
        if self.elements_by_id.contains_key(&new) {
            return Err(Error::DuplicateElementId(new));
        }
        self.element_mut(key)?.id = new;
        self.elements_by_id.remove(&previous);
        self.elements_by_id.insert(new, key);
        debug!(%previous, %new, "queue element id changed");
        Ok(key)
    }

    /// Replaces an element by a new one with its declared dependencies.
    ///
    /// The old element is unassigned and removed with its edges. The
    /// replacement enters detached under a fresh key; its dependencies are
    /// resolved by id, the replacement's own id naming the new element.
    /// Nothing changes if a dependency is unknown or would close a cycle.
    #[instrument(skip(self, replacement, dependencies), fields(replacement = %replacement.id))]
    pub fn replace_element(
        &mut self,
        old: ElementKey,
        replacement: &ElementSnapshot,
        dependencies: &[DependencySnapshot],
    ) -> Result<ElementKey> {
        let old_id = self.element(old)?.id;
        if replacement.id != old_id && self.elements_by_id.contains_key(&replacement.id) {
            return Err(Error::DuplicateElementId(replacement.id));
        }

        let new_key = ElementKey(self.elements.len());
        let resolve = |id: ElementId| -> Result<ElementKey> {
            if id == replacement.id {
                return Ok(new_key);
            }
            match self.elements_by_id.get(&id) {
                Some(&key) if key != old => Ok(key),
                _ => Err(Error::UnknownElementId(id)),
            }
        };
        let edges = dependencies
            .iter()
            .map(|d| Ok(QueueDependency::new(resolve(d.origin)?, resolve(d.destination)?, d.kind)))
            .collect::<Result<Vec<_>>>()?;

        let mut graph = self.graph.clone();
        graph.remove_vertex(old);
        graph.add_vertex(new_key);
        for edge in &edges {
            if !graph.add_edge(edge.origin, edge.destination, *edge) {
                warn!(
                    origin = %edge.origin,
                    destination = %edge.destination,
                    "ignoring duplicate or self dependency"
                );
            }
        }
        if graph.find_cycle().is_some() {
            return Err(Error::CycleDetected(replacement.id));
        }

        self.unassign_from_queue(old)?;
        self.unassigned.remove(&old);
        self.elements_by_id.remove(&old_id);
        self.elements[old.0] = None;
        self.graph = graph;
        let key = self.push_element(replacement);
        debug_assert_eq!(key, new_key);

        debug!(old = %old_id, new = %key, "queue element replaced");
        Ok(key)
    }

    /// The given elements ordered so that every dependency between two of
    /// them goes forward. Ties go to the earliest current start, unassigned
    /// elements first.
    pub fn in_topological_order(&self, elements: &[ElementKey]) -> Result<Vec<ElementKey>> {
        for &key in elements {
            self.element(key)?;
        }
        let Some(&first) = elements.first() else {
            return Ok(Vec::new());
        };
        let vertices: BTreeSet<_> = elements.iter().copied().collect();
        let subgraph = self.graph.induced_subgraph(&vertices);
        self.ordered(&subgraph, first)
    }

    /// Topological order of `graph`. A cycle is reported on one of its
    /// vertices, or on `culprit` if none is found.
    fn ordered(
        &self,
        graph: &DirectedGraph<ElementKey, QueueDependency>,
        culprit: ElementKey,
    ) -> Result<Vec<ElementKey>> {
        graph
            .topological_order_by(|v| (self.span_of(v).map(|s| s.start()), v))
            .ok_or_else(|| self.cycle_error(graph.find_cycle().unwrap_or(culprit)))
    }

    fn cycle_error(&self, at: ElementKey) -> Error {
        match self.element(at) {
            Ok(element) => Error::CycleDetected(element.id()),
            Err(err) => err,
        }
    }

    /// Dependencies constraining an element's start and end.
    ///
    /// Dependencies leaving an unassigned element carry no time of their
    /// own. They are replaced by the dependencies entering that element
    /// which propagate through them, repeatedly, until an assigned origin is
    /// reached.
    fn fill_incoming(&self, key: ElementKey) -> (Vec<QueueDependency>, Vec<QueueDependency>) {
        let mut start = Vec::new();
        let mut end = Vec::new();

        for (origin, dependency) in self.graph.incoming(key) {
            let adding_to = if dependency.modifies_destination_start() {
                &mut start
            } else {
                &mut end
            };
            if self.is_assigned(origin) {
                adding_to.push(*dependency);
                continue;
            }

            let mut seen = BTreeSet::new();
            let mut pending = vec![*dependency];
            while let Some(next) = pending.pop() {
                for (previous, each) in self.graph.incoming(next.origin) {
                    if !each.propagates_through(&next) || !seen.insert((previous, next.origin)) {
                        continue;
                    }
                    if self.is_assigned(previous) {
                        adding_to.push(*each);
                    } else {
                        pending.push(*each);
                    }
                }
            }
        }

        (start, end)
    }

    /// Placement floors of an element, optionally not before `start_at`.
    pub fn get_requirements_for(
        &self,
        key: ElementKey,
        start_at: Option<DateAndHour>,
    ) -> Result<InsertionRequirements> {
        let element = self.element(key)?;
        let (start, end) = self.fill_incoming(key);
        let origin_times = |dependencies: Vec<QueueDependency>| {
            dependencies
                .into_iter()
                .filter_map(|d| self.span_of(d.origin).map(|span| d.origin_time(&span)))
                .collect::<Vec<_>>()
        };
        Ok(InsertionRequirements::for_element(
            element,
            origin_times(start),
            origin_times(end),
            start_at,
        ))
    }

    /// Queues an element may be placed on.
    ///
    /// A specific allocation only fits its resource's queue. A generic one
    /// fits every queue whose resource has the type and satisfies all
    /// criteria at some point in time.
    pub fn get_assignable_queues(&self, key: ElementKey) -> Result<Vec<QueueKey>> {
        match self.element(key)?.allocation() {
            ResourceAllocation::Specific { resource, .. } => self
                .queue_for_resource(*resource)
                .map(|queue| vec![queue])
                .ok_or(Error::NoQueueForResource(*resource)),
            ResourceAllocation::Generic {
                resource_type,
                criteria,
                ..
            } => Ok(self
                .queues
                .iter()
                .filter(|queue| {
                    self.resources.get(&queue.resource()).is_some_and(|r| {
                        r.resource_type == *resource_type
                            && r.satisfies_criteria_at_some_point(criteria)
                    })
                })
                .map(LimitingResourceQueue::key)
                .collect()),
        }
    }

    /// Gaps of every assignable queue that could hold the element, merged
    /// by start. Generic allocations only see the parts of each gap where
    /// the resource satisfies the criteria.
    pub fn get_potentially_valid_gaps_for(
        &self,
        requirements: &InsertionRequirements,
    ) -> Result<Vec<GapOnQueue>> {
        let element = self.element(requirements.element())?;
        let mut lists = Vec::new();

        for queue_key in self.get_assignable_queues(element.key())? {
            let queue = self.queue(queue_key)?;
            let gaps = queue.gaps_potentially_valid_for(requirements);
            let gaps = match element.allocation().criteria() {
                None => gaps,
                Some(criteria) => {
                    let resource = self.resource(queue.resource())?;
                    gaps.into_iter()
                        .flat_map(|each| {
                            each.gap
                                .split_into_gaps_satisfying_criteria(resource, criteria)
                                .into_iter()
                                .map(move |gap| each.with_gap(gap))
                        })
                        .filter(|each| requirements.is_potentially_valid(&each.gap))
                        .collect()
                }
            };
            trace!(queue = %queue.id(), gaps = gaps.len(), "potentially valid gaps");
            lists.push(gaps);
        }

        Ok(GapsMergeSort::sort(lists))
    }

    pub fn gaps_with_queue_elements_on_queue_since(
        &self,
        queue: QueueKey,
        since: Option<DateAndHour>,
    ) -> Result<Vec<GapOnQueueWithQueueElement>> {
        Ok(self.queue(queue)?.gaps_with_queue_elements_since(since))
    }

    /// Elements to reinsert after moving `key`, unassigned and in order.
    ///
    /// The element comes first, followed by its assigned successors (the
    /// subgraph reachable by outgoing edges) in topological order. Every
    /// returned element is taken off its queue.
    #[instrument(skip(self))]
    pub fn get_insertions_to_be_done_for(&mut self, key: ElementKey) -> Result<Vec<ElementKey>> {
        self.element(key)?;
        let subgraph = self.graph.subgraph_reachable_from(key);
        if let Some(on_cycle) = subgraph.find_cycle() {
            return Err(self.cycle_error(on_cycle));
        }
        let order = self.ordered(&subgraph, key)?;

        let mut result = vec![key];
        result.extend(
            order
                .into_iter()
                .filter(|&each| each != key && self.is_assigned(each)),
        );
        for &each in &result {
            self.unassign_from_queue(each)?;
        }

        debug!(count = result.len(), "insertions to be done");
        Ok(result)
    }
}
