//! Loaded data a queues state is built from.
//!
//! The persistence collaborator reads queues, their elements, the unassigned
//! elements, the dependencies between them and the resources involved, and
//! hands them over as a [`QueuesSnapshot`]. Everything is addressed by
//! persistence ids here; arena keys only exist once a state is built.

use serde::{Deserialize, Serialize};

use crate::models::{
    DateAndHour, ElementId, Interval, QueueDependencyType, QueueId, Resource, ResourceAllocation,
    ResourceId,
};

/// Queues, unassigned elements, dependencies and resources as loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuesSnapshot {
    pub resources: Vec<Resource>,
    pub queues: Vec<QueueSnapshot>,
    pub unassigned: Vec<ElementSnapshot>,
    pub dependencies: Vec<DependencySnapshot>,
}

impl QueuesSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_queue(mut self, queue: QueueSnapshot) -> Self {
        self.queues.push(queue);
        self
    }

    pub fn with_unassigned(mut self, element: ElementSnapshot) -> Self {
        self.unassigned.push(element);
        self
    }

    pub fn with_dependency(
        mut self,
        origin: ElementId,
        destination: ElementId,
        kind: QueueDependencyType,
    ) -> Self {
        self.dependencies.push(DependencySnapshot {
            origin,
            destination,
            kind,
        });
        self
    }

    /// Every element, queued ones first in queue order.
    pub fn elements(&self) -> impl Iterator<Item = &ElementSnapshot> {
        self.queues
            .iter()
            .flat_map(|queue| queue.elements.iter())
            .chain(self.unassigned.iter())
    }
}

/// A queue of one resource and its assigned elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub id: QueueId,
    pub resource: ResourceId,
    #[serde(default)]
    pub elements: Vec<ElementSnapshot>,
}

impl QueueSnapshot {
    pub fn new(id: u64, resource: ResourceId) -> Self {
        Self {
            id: QueueId(id),
            resource,
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: ElementSnapshot) -> Self {
        self.elements.push(element);
        self
    }
}

/// A queue element as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: ElementId,
    pub allocation: ResourceAllocation,
    /// Required for elements on a queue, absent for unassigned ones.
    #[serde(default)]
    pub span: Option<Interval>,
    pub earliest_start_because_of_gantt: DateAndHour,
    #[serde(default)]
    pub earliest_end_because_of_gantt: Option<DateAndHour>,
}

impl ElementSnapshot {
    pub fn new(id: u64, allocation: ResourceAllocation, earliest_start: DateAndHour) -> Self {
        Self {
            id: ElementId(id),
            allocation,
            span: None,
            earliest_start_because_of_gantt: earliest_start,
            earliest_end_because_of_gantt: None,
        }
    }

    pub fn with_span(mut self, span: Interval) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_earliest_end(mut self, end: DateAndHour) -> Self {
        self.earliest_end_because_of_gantt = Some(end);
        self
    }
}

/// A dependency between two elements, by persistence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    pub origin: ElementId,
    pub destination: ElementId,
    pub kind: QueueDependencyType,
}
