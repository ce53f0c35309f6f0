//! Routing trait and default Dijkstra implementation.
//!
//! # Pluggability
//!
//! Callers route through the [`Router`] trait, so a bounded or goal-directed
//! search (A*, contraction hierarchies) can replace [`DijkstraRouter`]
//! without touching the facility finder.
//!
//! # Cost units
//!
//! Arc costs are metres of road (`f64`).  `Route::cost` is their sum.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use wp_core::{ArcId, EdgeId, GeoPoint, NodeIdx, VertexId};

use crate::network::RoadGraph;
use crate::{SpatialError, SpatialResult};

// ── Route ─────────────────────────────────────────────────────────────────────

/// The result of a routing query.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub source: VertexId,
    pub target: VertexId,
    /// Arcs to traverse in order, from source to target.
    pub arcs:   Vec<ArcId>,
    /// Road segments traversed, parallel to `arcs`.
    pub edges:  Vec<EdgeId>,
    /// Sum of arc costs, metres.
    pub cost:   f64,
    /// Travelled geometry in order, without repeated joints between arcs.
    pub coordinates: Vec<GeoPoint>,
}

impl Route {
    /// `true` if the source and target are the same vertex.
    pub fn is_trivial(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Geometry as `[lon, lat]` pairs.
    pub fn lon_lat(&self) -> Vec<[f64; 2]> {
        self.coordinates.iter().map(|p| p.lon_lat()).collect()
    }
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable single-pair shortest-path engine.
///
/// Implementations must be `Send + Sync`: one router is shared by every
/// worker of the route lookup pool.
pub trait Router: Send + Sync {
    /// Shortest route from `from` to `to`.
    ///
    /// `from == to` is an empty route of cost 0, not an error.
    ///
    /// # Errors
    ///
    /// - [`SpatialError::VertexNotFound`] if either vertex is not in `graph`.
    /// - [`SpatialError::PathNotFound`] if no arc sequence connects them.
    /// - [`SpatialError::SearchLimitExceeded`] if the search was cut off.
    fn shortest_path(&self, graph: &RoadGraph, from: VertexId, to: VertexId) -> SpatialResult<Route>;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Dijkstra's algorithm over the CSR road graph.
///
/// Frontier ties are broken by node index, which is ascending vertex id, so
/// the same query always settles vertices in the same order and returns the
/// same route.  A search that must expand more than `max_explored` vertices gives
/// up with [`SpatialError::SearchLimitExceeded`].
#[derive(Copy, Clone, Debug)]
pub struct DijkstraRouter {
    pub max_explored: usize,
}

impl DijkstraRouter {
    pub fn new(max_explored: usize) -> Self {
        Self { max_explored: max_explored.max(1) }
    }
}

impl Default for DijkstraRouter {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl Router for DijkstraRouter {
    fn shortest_path(&self, graph: &RoadGraph, from: VertexId, to: VertexId) -> SpatialResult<Route> {
        let source = graph.node_of(from).ok_or(SpatialError::VertexNotFound(from))?;
        let target = graph.node_of(to).ok_or(SpatialError::VertexNotFound(to))?;
        dijkstra(graph, source, target, self.max_explored)
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

/// Heap entry.  Ordered so that `BinaryHeap` (a max-heap) pops the lowest
/// cost first and, among equal costs, the lowest node index.
#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    node: NodeIdx,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn dijkstra(graph: &RoadGraph, source: NodeIdx, target: NodeIdx, max_explored: usize) -> SpatialResult<Route> {
    let (from, to) = (graph.vertex_id(source), graph.vertex_id(target));
    if source == target {
        return Ok(Route {
            source: from,
            target: to,
            arcs: vec![],
            edges: vec![],
            cost: 0.0,
            coordinates: vec![graph.vertex_pos[source.index()]],
        });
    }

    let n = graph.node_count();
    let mut dist     = vec![f64::INFINITY; n];
    let mut settled  = vec![false; n];
    // prev_arc[v] = arc that reached v; ArcId::INVALID for unreached nodes.
    let mut prev_arc = vec![ArcId::INVALID; n];
    let mut explored = 0usize;

    dist[source.index()] = 0.0;
    let mut heap = BinaryHeap::new();
    heap.push(State { cost: 0.0, node: source });

    while let Some(State { cost, node }) = heap.pop() {
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;

        if node == target {
            return Ok(reconstruct(graph, &prev_arc, source, target, cost));
        }

        // Up to `max_explored` non-target vertices are settled and relaxed.
        if explored >= max_explored {
            log::debug!("dijkstra {from} -> {to}: gave up after {explored} vertices");
            return Err(SpatialError::SearchLimitExceeded { from, to, explored });
        }
        explored += 1;

        for arc in graph.out_arcs(node) {
            let arc_cost = graph.arc_cost[arc.index()];
            if !arc_cost.is_finite() {
                continue;
            }
            let neighbor = graph.arc_to[arc.index()];
            if settled[neighbor.index()] {
                continue;
            }
            let new_cost = cost + arc_cost;
            if new_cost < dist[neighbor.index()] {
                dist[neighbor.index()] = new_cost;
                prev_arc[neighbor.index()] = arc;
                heap.push(State { cost: new_cost, node: neighbor });
            }
        }
    }

    Err(SpatialError::PathNotFound { from, to })
}

fn reconstruct(graph: &RoadGraph, prev_arc: &[ArcId], source: NodeIdx, target: NodeIdx, cost: f64) -> Route {
    let mut arcs = Vec::new();
    let mut cur = target;
    while cur != source {
        let a = prev_arc[cur.index()];
        debug_assert_ne!(a, ArcId::INVALID, "settled node without predecessor");
        arcs.push(a);
        cur = graph.arc_from[a.index()];
    }
    arcs.reverse();

    let mut coordinates: Vec<GeoPoint> = Vec::new();
    for &a in &arcs {
        for p in graph.arc_geometry(a) {
            // Consecutive arcs usually share their joint coordinate.
            if coordinates.last() != Some(&p) {
                coordinates.push(p);
            }
        }
    }

    Route {
        source: graph.vertex_id(source),
        target: graph.vertex_id(target),
        edges: arcs.iter().map(|&a| graph.arc_edge(a)).collect(),
        arcs,
        cost,
        coordinates,
    }
}
