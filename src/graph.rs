//! Owned simple directed graph.
//!
//! At most one edge per ordered pair of vertices and no self loops. Vertices
//! are small `Copy` keys; edges carry a payload. Used for the dependency
//! graph between queue elements and for the derived views built from it.
//!
//! # Algorithms
//! - Cycle detection: iterative DFS with white/grey/black colouring. A grey
//!   successor is a back edge.
//! - Topological order: Kahn's algorithm with the ready set ordered by a
//!   caller supplied key, so ties are broken deterministically.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.3-22.4
//! Kahn (1962), "Topological sorting of large networks"

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// A simple directed graph with edge payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedGraph<V, E> {
    outgoing: BTreeMap<V, BTreeMap<V, E>>,
    incoming: BTreeMap<V, BTreeSet<V>>,
}

impl<V, E> Default for DirectedGraph<V, E> {
    fn default() -> Self {
        Self {
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    Grey,
    Black,
}

impl<V, E> DirectedGraph<V, E>
where
    V: Ord + Copy,
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex. Returns `false` if it was already present.
    pub fn add_vertex(&mut self, vertex: V) -> bool {
        if self.outgoing.contains_key(&vertex) {
            return false;
        }
        self.outgoing.insert(vertex, BTreeMap::new());
        self.incoming.insert(vertex, BTreeSet::new());
        true
    }

    pub fn contains_vertex(&self, vertex: V) -> bool {
        self.outgoing.contains_key(&vertex)
    }

    /// Removes a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, vertex: V) -> bool {
        let Some(successors) = self.outgoing.remove(&vertex) else {
            return false;
        };
        for successor in successors.keys() {
            if let Some(origins) = self.incoming.get_mut(successor) {
                origins.remove(&vertex);
            }
        }
        for origin in self.incoming.remove(&vertex).unwrap_or_default() {
            if let Some(edges) = self.outgoing.get_mut(&origin) {
                edges.remove(&vertex);
            }
        }
        true
    }

    /// Adds an edge, adding missing endpoints first.
    ///
    /// Returns `false` when nothing was added: the edge is a self loop or
    /// the ordered pair already has an edge, whose payload is kept.
    pub fn add_edge(&mut self, origin: V, destination: V, edge: E) -> bool {
        if origin == destination {
            return false;
        }
        self.add_vertex(origin);
        self.add_vertex(destination);

        let edges = self.outgoing.entry(origin).or_default();
        if edges.contains_key(&destination) {
            return false;
        }
        edges.insert(destination, edge);
        self.incoming.entry(destination).or_default().insert(origin);
        true
    }

    pub fn edge(&self, origin: V, destination: V) -> Option<&E> {
        self.outgoing.get(&origin)?.get(&destination)
    }

    /// Successors of `vertex`, with the edges leading to them.
    pub fn outgoing(&self, vertex: V) -> impl Iterator<Item = (V, &E)> + '_ {
        self.outgoing
            .get(&vertex)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(&v, e)| (v, e)))
    }

    /// Predecessors of `vertex`, with the edges leading from them.
    pub fn incoming(&self, vertex: V) -> impl Iterator<Item = (V, &E)> + '_ {
        self.incoming
            .get(&vertex)
            .into_iter()
            .flatten()
            .filter_map(move |&origin| Some((origin, self.edge(origin, vertex)?)))
    }

    fn successors(&self, vertex: V) -> impl Iterator<Item = V> + '_ {
        self.outgoing
            .get(&vertex)
            .into_iter()
            .flat_map(|edges| edges.keys().copied())
    }

    pub fn vertices(&self) -> impl Iterator<Item = V> + '_ {
        self.outgoing.keys().copied()
    }

    /// Every edge as `(origin, destination, payload)`.
    pub fn edges(&self) -> impl Iterator<Item = (V, V, &E)> + '_ {
        self.outgoing
            .iter()
            .flat_map(|(&origin, edges)| edges.iter().map(move |(&dest, e)| (origin, dest, e)))
    }

    pub fn vertex_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeMap::len).sum()
    }

    /// A vertex lying on a cycle, if the graph has one.
    pub fn find_cycle(&self) -> Option<V> {
        let mut colour: BTreeMap<V, Colour> = BTreeMap::new();

        for root in self.vertices() {
            if colour.contains_key(&root) {
                continue;
            }
            colour.insert(root, Colour::Grey);
            let mut stack = vec![(root, self.successors(root))];

            while let Some((vertex, successors)) = stack.last_mut() {
                let vertex = *vertex;
                match successors.next() {
                    Some(next) => match colour.get(&next) {
                        Some(Colour::Grey) => return Some(next), // back edge
                        Some(Colour::Black) => {}
                        None => {
                            colour.insert(next, Colour::Grey);
                            stack.push((next, self.successors(next)));
                        }
                    },
                    None => {
                        colour.insert(vertex, Colour::Black);
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Vertices in an order where every edge goes forward.
    ///
    /// Among the vertices ready at a given step, the one with the smallest
    /// `key` (then the smallest vertex) comes first. Returns `None` on a
    /// cycle.
    pub fn topological_order_by<K, F>(&self, mut key: F) -> Option<Vec<V>>
    where
        K: Ord,
        F: FnMut(V) -> K,
    {
        let mut in_degree: BTreeMap<V, usize> = self
            .incoming
            .iter()
            .map(|(&vertex, origins)| (vertex, origins.len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<(K, V)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&vertex, _)| Reverse((key(vertex), vertex)))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse((_, vertex))) = ready.pop() {
            order.push(vertex);
            for next in self.successors(vertex) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((key(next), next)));
                    }
                }
            }
        }

        (order.len() == in_degree.len()).then_some(order)
    }

    /// Vertices reachable from `roots` through outgoing edges, roots
    /// included.
    pub fn reachable_from<I>(&self, roots: I) -> BTreeSet<V>
    where
        I: IntoIterator<Item = V>,
    {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<V> = roots
            .into_iter()
            .filter(|root| self.contains_vertex(*root))
            .collect();

        while let Some(vertex) = pending.pop() {
            if seen.insert(vertex) {
                pending.extend(self.successors(vertex).filter(|next| !seen.contains(next)));
            }
        }
        seen
    }

    /// The subgraph of everything reachable from `root`.
    pub fn subgraph_reachable_from(&self, root: V) -> Self {
        self.induced_subgraph(&self.reachable_from([root]))
    }

    /// The given vertices and every edge between two of them.
    pub fn induced_subgraph(&self, vertices: &BTreeSet<V>) -> Self {
        let mut result = Self::new();
        for &vertex in vertices {
            if self.contains_vertex(vertex) {
                result.add_vertex(vertex);
            }
        }
        for &origin in vertices {
            for (destination, edge) in self.outgoing(origin) {
                if vertices.contains(&destination) {
                    result.add_edge(origin, destination, edge.clone());
                }
            }
        }
        result
    }
}
