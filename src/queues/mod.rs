//! In-memory state of the limiting resource queues.
//!
//! A [`QueuesState`] is built from a [`QueuesSnapshot`] for one editing
//! session, mutated by the allocation policies and dropped once the
//! collaborator has persisted the reported changes.
//!
//! # Components
//!
//! - **`snapshot`**: serde types the state is built from
//! - **`state`**: the aggregate root (queues, unassigned set, dependency
//!   graph, id lookups)
//! - **`requirements`**: placement floors of an element
//! - **`merge`**: stable merge of per-queue gap lists
//! - **`affected`**: impact view of an insertion

mod affected;
mod merge;
mod requirements;
mod snapshot;
mod state;

#[cfg(test)]
pub(crate) mod fixtures;

pub use affected::{AffectedEdge, AffectedEdgeKind, AffectedGraph};
pub use merge::GapsMergeSort;
pub use requirements::InsertionRequirements;
pub use snapshot::{DependencySnapshot, ElementSnapshot, QueueSnapshot, QueuesSnapshot};
pub use state::QueuesState;
