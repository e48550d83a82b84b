//! Queue elements, their resource allocations and the dependencies
//! between them.
//!
//! A queue element is the unit of work placed on a limiting resource queue.
//! It is either assigned (it belongs to a queue and has a span) or detached.
//!
//! # Identity
//! Elements carry two identities:
//! - `ElementKey`: an arena index assigned when the element enters a
//!   [`QueuesState`](crate::queues::QueuesState). Stable for the lifetime of
//!   the state and never reused.
//! - `ElementId`: the persistence id. It may change when the collaborator
//!   saves the element, and must then be reported back to the state.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Criterion, DateAndHour, Interval, QueueKey, ResourceId, ResourceType};

/// Arena index of a queue element inside a queues state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementKey(pub(crate) usize);

impl ElementKey {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Persistence id of a queue element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a dependency relates the origin and the destination.
///
/// The first word names the origin endpoint that is read, the second the
/// destination endpoint that is constrained: `EndStart` means "the
/// destination cannot start before the origin ends".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QueueDependencyType {
    StartStart,
    EndStart,
    EndEnd,
    StartEnd,
}

impl QueueDependencyType {
    /// Whether the destination's start is constrained.
    pub fn modifies_destination_start(&self) -> bool {
        matches!(self, Self::StartStart | Self::EndStart)
    }

    /// Whether the destination's end is constrained.
    pub fn modifies_destination_end(&self) -> bool {
        !self.modifies_destination_start()
    }

    /// Whether the origin's start (rather than its end) is read.
    pub fn considers_origin_start(&self) -> bool {
        matches!(self, Self::StartStart | Self::StartEnd)
    }

    /// Whether a dependency of this type into an element `X` still bounds
    /// what a `next` dependency out of `X` reads.
    ///
    /// Only the endpoint of `X` this dependency constrains carries over: a
    /// start bound reaches dependencies reading `X`'s start, an end bound
    /// those reading `X`'s end.
    pub fn propagates_through(&self, next: QueueDependencyType) -> bool {
        if self.modifies_destination_start() {
            next.considers_origin_start()
        } else {
            !next.considers_origin_start()
        }
    }
}

/// A precedence edge between two queue elements of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueDependency {
    pub origin: ElementKey,
    pub destination: ElementKey,
    pub kind: QueueDependencyType,
}

impl QueueDependency {
    pub fn new(origin: ElementKey, destination: ElementKey, kind: QueueDependencyType) -> Self {
        Self {
            origin,
            destination,
            kind,
        }
    }

    pub fn modifies_destination_start(&self) -> bool {
        self.kind.modifies_destination_start()
    }

    /// See [`QueueDependencyType::propagates_through`]. `next` must leave
    /// this dependency's destination.
    pub fn propagates_through(&self, next: &QueueDependency) -> bool {
        debug_assert_eq!(self.destination, next.origin);
        self.kind.propagates_through(next.kind)
    }

    /// The origin time this dependency reads from an assigned origin span.
    pub fn origin_time(&self, origin_span: &Interval) -> DateAndHour {
        if self.kind.considers_origin_start() {
            origin_span.start()
        } else {
            origin_span.end()
        }
    }
}

/// The resource allocation a queue element stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceAllocation {
    /// Bound to one resource.
    Specific {
        resource: ResourceId,
        intended_hours: u32,
    },
    /// Any resource of a type satisfying every criterion.
    Generic {
        resource_type: ResourceType,
        criteria: BTreeSet<Criterion>,
        intended_hours: u32,
    },
}

impl ResourceAllocation {
    pub fn specific(resource: ResourceId, intended_hours: u32) -> Self {
        Self::Specific {
            resource,
            intended_hours,
        }
    }

    pub fn generic<I, S>(resource_type: ResourceType, criteria: I, intended_hours: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Generic {
            resource_type,
            criteria: criteria.into_iter().map(|name| Criterion(name.into())).collect(),
            intended_hours,
        }
    }

    /// Workable hours the element needs.
    pub fn intended_hours(&self) -> u32 {
        match self {
            Self::Specific { intended_hours, .. } | Self::Generic { intended_hours, .. } => {
                *intended_hours
            }
        }
    }

    pub fn is_specific(&self) -> bool {
        matches!(self, Self::Specific { .. })
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Generic { .. })
    }

    /// The bound resource of a specific allocation.
    pub fn resource(&self) -> Option<ResourceId> {
        match self {
            Self::Specific { resource, .. } => Some(*resource),
            Self::Generic { .. } => None,
        }
    }

    /// The required criteria of a generic allocation.
    pub fn criteria(&self) -> Option<&BTreeSet<Criterion>> {
        match self {
            Self::Generic { criteria, .. } => Some(criteria),
            Self::Specific { .. } => None,
        }
    }
}

/// A queue element living inside a queues state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueElement {
    pub(crate) key: ElementKey,
    pub(crate) id: ElementId,
    pub(crate) allocation: ResourceAllocation,
    pub(crate) queue: Option<QueueKey>,
    pub(crate) span: Option<Interval>,
    pub(crate) earliest_start_because_of_gantt: DateAndHour,
    pub(crate) earliest_end_because_of_gantt: Option<DateAndHour>,
}

impl QueueElement {
    pub fn key(&self) -> ElementKey {
        self.key
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn allocation(&self) -> &ResourceAllocation {
        &self.allocation
    }

    pub fn intended_hours(&self) -> u32 {
        self.allocation.intended_hours()
    }

    /// The queue holding this element, `None` when detached.
    pub fn queue(&self) -> Option<QueueKey> {
        self.queue
    }

    pub fn span(&self) -> Option<Interval> {
        self.span
    }

    pub fn is_detached(&self) -> bool {
        self.queue.is_none()
    }

    pub fn start_time(&self) -> Option<DateAndHour> {
        self.span.map(|span| span.start())
    }

    pub fn end_time(&self) -> Option<DateAndHour> {
        self.span.map(|span| span.end())
    }

    /// Earliest start imposed by the project plan.
    pub fn earliest_start_because_of_gantt(&self) -> DateAndHour {
        self.earliest_start_because_of_gantt
    }

    /// Earliest end imposed by the project plan; falls back to the earliest
    /// start when the plan sets none.
    pub fn earliest_end_because_of_gantt(&self) -> DateAndHour {
        self.earliest_end_because_of_gantt
            .unwrap_or(self.earliest_start_because_of_gantt)
    }

    /// Whether `time` falls within the element's span, both ends included.
    pub fn is_in_the_middle(&self, time: DateAndHour) -> bool {
        self.span
            .is_some_and(|span| span.start() <= time && time <= span.end())
    }

    pub(crate) fn attach(&mut self, queue: QueueKey, span: Interval) {
        self.queue = Some(queue);
        self.span = Some(span);
    }

    pub(crate) fn detach(&mut self) {
        self.queue = None;
        self.span = None;
    }
}

/// An element placed by an allocation operation, with where it landed.
///
/// Ordered by queue, then span, then key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InsertedElement {
    pub queue: QueueKey,
    pub interval: Interval,
    pub element: ElementKey,
    pub id: ElementId,
}
