//! Input validation for queues snapshots.
//!
//! Checks structural integrity of a snapshot before a queues state is built
//! from it. Detects:
//! - Duplicate ids (elements, queues, resources)
//! - Missing resource and element references
//! - Several queues for one resource
//! - Self and duplicate dependencies
//! - Spans missing on queued elements or present on unassigned ones
//! - Overlapping elements on a queue
//! - Elements queued on a resource their allocation cannot use
//! - Circular dependencies (DAG validation)
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::AllocationConfig;
use crate::graph::DirectedGraph;
use crate::models::{ElementId, Resource, ResourceAllocation, ResourceId};
use crate::queues::{ElementSnapshot, QueueSnapshot, QueuesSnapshot};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A queue or allocation references a resource that doesn't exist.
    InvalidResourceReference,
    /// A dependency references an element that doesn't exist.
    InvalidElementReference,
    /// Two queues belong to the same resource.
    DuplicateQueueForResource,
    /// A dependency from an element to itself.
    SelfDependency,
    /// Two dependencies join the same ordered pair of elements.
    DuplicateDependency,
    /// A queued element has no span.
    MissingSpan,
    /// An unassigned element has a span.
    UnexpectedSpan,
    /// Two elements of a queue overlap in time.
    OverlappingElements,
    /// An element sits on a queue its allocation cannot use.
    AllocationMismatch,
    /// Dependency graph contains a cycle.
    CyclicDependency,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Validates a snapshot before building a queues state from it.
///
/// Checks:
/// 1. No duplicate resource, queue or element ids
/// 2. Queue resources and specific allocations reference known resources
/// 3. At most one queue per resource
/// 4. Queued elements have a span, unassigned ones don't
/// 5. Queued elements fit their queue's resource and do not overlap
/// 6. Dependencies reference known elements and are not self loops
/// 7. No duplicate dependency on an ordered pair, unless the config
///    collapses them
/// 8. No circular dependencies
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_snapshot(snapshot: &QueuesSnapshot, config: &AllocationConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let mut resources: BTreeMap<ResourceId, &Resource> = BTreeMap::new();
    for r in &snapshot.resources {
        if resources.insert(r.id, r).is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resource ID: {}", r.id),
            ));
        }
    }

    let mut element_ids = BTreeSet::new();
    for element in snapshot.elements() {
        if !element_ids.insert(element.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate queue element ID: {}", element.id),
            ));
        }
        if let ResourceAllocation::Specific { resource, .. } = element.allocation {
            if !resources.contains_key(&resource) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidResourceReference,
                    format!("Queue element {} references unknown resource {resource}", element.id),
                ));
            }
        }
    }

    let mut queue_ids = BTreeSet::new();
    let mut queued_resources = BTreeSet::new();
    for queue in &snapshot.queues {
        if !queue_ids.insert(queue.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate queue ID: {}", queue.id),
            ));
        }
        if !queued_resources.insert(queue.resource) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateQueueForResource,
                format!("Resource {} has more than one queue", queue.resource),
            ));
        }
        match resources.get(&queue.resource) {
            Some(resource) => check_queue(queue, resource, &mut errors),
            None => errors.push(ValidationError::new(
                ValidationErrorKind::InvalidResourceReference,
                format!("Queue {} references unknown resource {}", queue.id, queue.resource),
            )),
        }
    }

    for element in &snapshot.unassigned {
        if element.span.is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnexpectedSpan,
                format!("Unassigned queue element {} has a span", element.id),
            ));
        }
    }

    check_dependencies(snapshot, &element_ids, config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_queue(queue: &QueueSnapshot, resource: &Resource, errors: &mut Vec<ValidationError>) {
    let mut spans = Vec::new();
    for element in &queue.elements {
        if !fits_resource(element, resource) {
            errors.push(ValidationError::new(
                ValidationErrorKind::AllocationMismatch,
                format!(
                    "Queue element {} cannot be on queue {} of resource {}",
                    element.id, queue.id, resource.id
                ),
            ));
        }
        match element.span {
            Some(span) => spans.push((span, element.id)),
            None => errors.push(ValidationError::new(
                ValidationErrorKind::MissingSpan,
                format!("Queue element {} on queue {} has no span", element.id, queue.id),
            )),
        }
    }

    spans.sort();
    for pair in spans.windows(2) {
        let ((first, first_id), (second, second_id)) = (pair[0], pair[1]);
        if first.overlaps_with(&second) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OverlappingElements,
                format!(
                    "Queue elements {first_id} and {second_id} overlap on queue {}",
                    queue.id
                ),
            ));
        }
    }
}

fn fits_resource(element: &ElementSnapshot, resource: &Resource) -> bool {
    match &element.allocation {
        ResourceAllocation::Specific { resource: id, .. } => *id == resource.id,
        ResourceAllocation::Generic { resource_type, .. } => {
            *resource_type == resource.resource_type
        }
    }
}

/// Reference, self loop, duplicate and cycle checks over the dependencies.
fn check_dependencies(
    snapshot: &QueuesSnapshot,
    element_ids: &BTreeSet<ElementId>,
    config: &AllocationConfig,
    errors: &mut Vec<ValidationError>,
) {
    let mut graph: DirectedGraph<ElementId, ()> = DirectedGraph::new();
    for &id in element_ids {
        graph.add_vertex(id);
    }

    for dependency in &snapshot.dependencies {
        let mut known = true;
        for id in [dependency.origin, dependency.destination] {
            if !element_ids.contains(&id) {
                known = false;
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidElementReference,
                    format!("Dependency references unknown queue element {id}"),
                ));
            }
        }
        if !known {
            continue;
        }

        if dependency.origin == dependency.destination {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelfDependency,
                format!("Queue element {} depends on itself", dependency.origin),
            ));
            continue;
        }

        let added = graph.add_edge(dependency.origin, dependency.destination, ());
        if !added && !config.collapse_duplicate_dependencies {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateDependency,
                format!(
                    "More than one dependency from {} to {}",
                    dependency.origin, dependency.destination
                ),
            ));
        }
    }

    if let Some(node) = graph.find_cycle() {
        errors.push(ValidationError::new(
            ValidationErrorKind::CyclicDependency,
            format!("Circular dependency detected involving queue element {node}"),
        ));
    }
}
