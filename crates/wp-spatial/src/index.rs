//! Static nearest-neighbour index over geographic points.
//!
//! # Metric
//!
//! Points are embedded on a sphere of Earth radius (see
//! [`GeoPoint::to_ecef`]) and stored in an `rstar` R-tree.  Euclidean chord
//! distance in that embedding is strictly increasing with great-circle
//! distance, so the R-tree's pruning and ordering are exact for geodesic
//! queries, with no lat/lon distortion near the poles or the antimeridian.
//!
//! Reported distances are recovered from the chord, which keeps them
//! monotone in the order the tree yields them.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use wp_core::geo::{EARTH_RADIUS_M, chord_for_distance};
use wp_core::{CoreError, GeoPoint};

use crate::{SpatialError, SpatialResult};

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct IndexEntry<I> {
    point:    [f64; 3],
    position: GeoPoint,
    id:       I,
}

impl<I> RTreeObject for IndexEntry<I> {
    type Envelope = AABB<[f64; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl<I> PointDistance for IndexEntry<I> {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        let dz = self.point[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Great-circle distance for a squared chord length.
#[inline]
fn chord2_to_distance_m(chord2: f64) -> f64 {
    let half = (chord2.sqrt() / (2.0 * EARTH_RADIUS_M)).min(1.0);
    2.0 * EARTH_RADIUS_M * half.asin()
}

// ── Neighbor ──────────────────────────────────────────────────────────────────

/// One hit from a [`SpatialIndex`] query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Neighbor<I> {
    pub id:         I,
    pub position:   GeoPoint,
    pub distance_m: f64,
}

// ── SpatialIndex ──────────────────────────────────────────────────────────────

/// Read-only nearest-neighbour index over `(id, position)` pairs.
///
/// Rebuilding requires a fresh index; there is no incremental mutation.
pub struct SpatialIndex<I> {
    tree: RTree<IndexEntry<I>>,
}

impl<I: Copy + Ord> SpatialIndex<I> {
    /// Bulk-load the index.  O(N log N).
    pub fn build(points: impl IntoIterator<Item = (I, GeoPoint)>) -> Self {
        let entries: Vec<IndexEntry<I>> = points
            .into_iter()
            .map(|(id, position)| IndexEntry { point: position.to_ecef(), position, id })
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The `k` indexed points closest to `point`, ascending by distance.
    ///
    /// Equidistant points are ordered by ascending id, including at the
    /// `k`-th position: every point tied with the last admitted one is
    /// considered before truncating.
    pub fn nearest(&self, point: GeoPoint, k: usize) -> SpatialResult<Vec<Neighbor<I>>> {
        let q = self.query_point(point)?;
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(f64, &IndexEntry<I>)> = Vec::with_capacity(k + 1);
        let mut cutoff: Option<f64> = None;
        for entry in self.tree.nearest_neighbor_iter(&q) {
            let d2 = entry.distance_2(&q);
            if cutoff.is_some_and(|c| d2 > c) {
                break;
            }
            hits.push((d2, entry));
            if hits.len() == k {
                cutoff = Some(d2);
            }
        }

        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.truncate(k);
        Ok(hits
            .into_iter()
            .map(|(d2, e)| Neighbor { id: e.id, position: e.position, distance_m: chord2_to_distance_m(d2) })
            .collect())
    }

    /// Every indexed point within `radius_m` of `point`, in no particular
    /// order.  A non-positive radius contains nothing.
    pub fn within(&self, point: GeoPoint, radius_m: f64) -> SpatialResult<Vec<Neighbor<I>>> {
        let q = self.query_point(point)?;
        if radius_m.is_nan() || radius_m <= 0.0 {
            return Ok(Vec::new());
        }

        let chord = chord_for_distance(radius_m);
        Ok(self
            .tree
            .locate_within_distance(q, chord * chord)
            .map(|e| Neighbor {
                id:         e.id,
                position:   e.position,
                distance_m: chord2_to_distance_m(e.distance_2(&q)),
            })
            .collect())
    }

    fn query_point(&self, point: GeoPoint) -> SpatialResult<[f64; 3]> {
        if !point.is_valid() {
            return Err(CoreError::InvalidCoordinate(point).into());
        }
        if self.is_empty() {
            return Err(SpatialError::IndexEmpty);
        }
        Ok(point.to_ecef())
    }
}
