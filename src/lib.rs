//! Limiting resource queue allocation.
//!
//! Keeps one queue of time-bounded elements per limiting resource, finds the
//! free gaps where an element fits given the dependencies it has on other
//! elements, and places elements either inside free time or over other
//! elements, reinserting whatever the move pushes.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `DateAndHour`, `Interval`, `Calendar`,
//!   `Resource`, `QueueElement`, `QueueDependency`, `LimitingResourceQueue`,
//!   `Gap`
//! - **`graph`**: Directed graph with cycle detection, topological order and
//!   reachability
//! - **`queues`**: `QueuesState`, the per-session aggregate built from a
//!   `QueuesSnapshot`, with gap search and dependency propagation
//! - **`allocator`**: Valid gaps, earliest/latest/day allocation times and
//!   the allocation policies
//! - **`validation`**: Snapshot integrity checks (duplicate IDs, references,
//!   overlaps, dependency cycles)
//! - **`config`**: `AllocationConfig`
//! - **`error`**: Crate-wide `Error` and `Result`
//!
//! # Usage
//!
//! ```ignore
//! let mut state = QueuesState::from_snapshot(&snapshot, AllocationConfig::default())?;
//! let element = state.get_equivalent(ElementId(3)).ok_or(Error::UnknownElementId(ElementId(3)))?;
//! let inserted = state.appropriative_allocation(element, queue, at)?;
//! ```
//!
//! # Architecture
//!
//! The state is owned by one editing session and mutated synchronously.
//! Persisting the reported insertions is left to the caller.

pub mod allocator;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod queues;
pub mod validation;

pub use allocator::{AllocationTime, LimitingResourceAllocator};
pub use config::AllocationConfig;
pub use error::{Error, Result};
pub use queues::{QueuesSnapshot, QueuesState};
