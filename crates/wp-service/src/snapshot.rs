//! Immutable routing state shared by concurrent queries.

use wp_spatial::{RoadGraph, RoadSegment, VertexLocator};

/// A built road graph plus the locator over its vertices.
///
/// Snapshots are never mutated.  Topology repair builds a new one and the
/// service swaps it in; queries already holding the old `Arc` finish on it.
pub struct RoutingSnapshot {
    pub graph:   RoadGraph,
    pub locator: VertexLocator,
}

impl RoutingSnapshot {
    pub fn build(segments: &[RoadSegment], max_snap_distance_m: f64) -> Self {
        let graph = RoadGraph::from_segments(segments);
        let locator = VertexLocator::for_graph(&graph, max_snap_distance_m);
        Self { graph, locator }
    }

    pub fn empty(max_snap_distance_m: f64) -> Self {
        Self::build(&[], max_snap_distance_m)
    }
}
