//! Crate-wide error type.
//!
//! Three families of failures exist:
//! - **invalid input**: rejected before any mutation of the queues state
//!   (unknown references, collisions, missing gap or day selections);
//! - **internal invariant violations**: a cycle in a subgraph that must be
//!   acyclic, or a specific allocation whose resource has no queue. These
//!   signal a bug in whoever built the state; see [`Error::is_internal`];
//! - **cascade failures**: an appropriative or automatic allocation could not
//!   reinsert a displaced element. The state is restored before returning.
//!
//! "No valid gaps" for a query is not an error: queries return an empty list.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{DateAndHour, ElementId, ElementKey, QueueId, QueueKey, ResourceId};
use crate::validation::ValidationError;

/// Errors raised by the queue allocation engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("snapshot failed validation with {} problem(s)", .0.len())]
    InvalidSnapshot(Vec<ValidationError>),

    #[error("hour {0} is outside 0..=23")]
    InvalidHour(u8),

    #[error("interval start {start} is after its end {end}")]
    InvalidInterval { start: DateAndHour, end: DateAndHour },

    #[error("unknown queue element {0}")]
    UnknownElement(ElementKey),

    #[error("no queue element has id {0}")]
    UnknownElementId(ElementId),

    #[error("queue element id {0} is already in use")]
    DuplicateElementId(ElementId),

    #[error("unknown queue {0}")]
    UnknownQueue(QueueKey),

    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),

    #[error("resource {0} has no limiting resource queue")]
    NoQueueForResource(ResourceId),

    #[error("queue {queue} cannot hold queue element {element}")]
    QueueNotAssignable { element: ElementId, queue: QueueId },

    #[error("queue element {0} is not unassigned")]
    NotUnassigned(ElementId),

    #[error("placing queue element {element} on queue {queue} at {at} collides with {with}")]
    Collision {
        element: ElementId,
        queue: QueueId,
        at: DateAndHour,
        with: ElementId,
    },

    #[error("a gap must be selected to compute the allocation time")]
    MissingGap,

    #[error("the latest allocation time is undefined for a gap without end")]
    UnboundedGap,

    #[error("day {0} is not valid for the allocation")]
    InvalidDay(NaiveDate),

    #[error("no valid gap found for queue element {0}")]
    NoValidGap(ElementId),

    #[error("could not reinsert queue element {displaced} after allocating {element}")]
    CascadeFailed {
        element: ElementId,
        displaced: ElementId,
    },

    #[error("dependency subgraph reachable from queue element {0} has cycles")]
    CycleDetected(ElementId),

    #[error("no workable hours within {days} days from {from}")]
    HorizonExceeded { from: DateAndHour, days: u32 },
}

impl Error {
    /// Whether the error reveals a corrupted queues state rather than a bad
    /// request. Callers should treat these as bugs.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::CycleDetected(_) | Error::NoQueueForResource(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
