//! Coordinate → nearest graph vertex.

use wp_core::{GeoPoint, VertexId};

use crate::network::{RoadGraph, Vertex};
use crate::{SpatialError, SpatialIndex, SpatialResult};

/// Snaps arbitrary coordinates to the nearest vertex within a maximum
/// distance.  The cap keeps a point from snapping across a data gap onto a
/// road network it is not actually connected to.
pub struct VertexLocator {
    index:  SpatialIndex<VertexId>,
    max_m:  f64,
}

impl VertexLocator {
    pub fn new(vertices: impl IntoIterator<Item = Vertex>, max_snap_distance_m: f64) -> Self {
        Self {
            index: SpatialIndex::build(vertices.into_iter().map(|v| (v.id, v.position))),
            max_m: max_snap_distance_m,
        }
    }

    /// Locator over every vertex of a built graph.
    pub fn for_graph(graph: &RoadGraph, max_snap_distance_m: f64) -> Self {
        Self::new(graph.vertices(), max_snap_distance_m)
    }

    pub fn max_snap_distance_m(&self) -> f64 {
        self.max_m
    }

    pub fn vertex_count(&self) -> usize {
        self.index.len()
    }

    /// Nearest vertex, or `None` when the index is empty or the nearest
    /// vertex is farther than the snap limit.
    pub fn snap(&self, position: GeoPoint) -> Option<VertexId> {
        self.try_snap(position).ok()
    }

    /// Like [`snap`](Self::snap) but reports why nothing was found.
    ///
    /// # Errors
    ///
    /// [`SpatialError::IndexEmpty`] with no vertices loaded,
    /// [`SpatialError::VertexSnapFailed`] when the nearest vertex is too far.
    pub fn try_snap(&self, position: GeoPoint) -> SpatialResult<VertexId> {
        let nearest = self
            .index
            .nearest(position, 1)?
            .into_iter()
            .next()
            .ok_or(SpatialError::IndexEmpty)?;
        if nearest.distance_m > self.max_m {
            return Err(SpatialError::VertexSnapFailed {
                distance_m: nearest.distance_m,
                max_m:      self.max_m,
            });
        }
        Ok(nearest.id)
    }
}
