//! Limiting resource domain models.
//!
//! Value types shared by the queues state and the allocator: time positions,
//! calendars, resources, queue elements, queues and the gaps between their
//! elements.
//!
//! # Domain Mappings
//!
//! | queue-alloc | Workshop | Maintenance |
//! |-------------|----------|-------------|
//! | Resource | Machine/Worker | Technician/Rig |
//! | QueueElement | Operation | Work Order |
//! | LimitingResourceQueue | Machine Queue | Rig Timeline |
//! | Gap | Idle Slot | Free Window |

mod calendar;
mod element;
mod gap;
mod queue;
mod resource;
mod time;

pub use calendar::{Calendar, FULL_DAY};
pub use element::{
    ElementId, ElementKey, InsertedElement, QueueDependency, QueueDependencyType, QueueElement,
    ResourceAllocation,
};
pub use gap::{Gap, GapOnQueue, GapOnQueueWithQueueElement};
pub use queue::{LimitingResourceQueue, QueueId, QueueKey};
pub use resource::{Criterion, CriterionSatisfaction, DateRange, Resource, ResourceId, ResourceType};
pub use time::{DateAndHour, Interval};
