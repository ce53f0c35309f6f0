//! One-shot topology repair for imported road segments.
//!
//! # What gets fixed
//!
//! 1. **Links.**  A segment with an unset `source` or `target` has that
//!    endpoint snapped to the nearest existing vertex (the vertex set is
//!    materialised from the endpoints segments already reference).  If no
//!    vertex is within the snap limit the endpoint stays unset and the
//!    segment is marked `excluded`.
//! 2. **Costs.**  Every non-excluded segment with an unset cost gets the
//!    geodesic length of its geometry.  One-way segments get
//!    `f64::INFINITY` in the forbidden direction.
//!
//! Every segment changed by a run is handed to a [`TopologyStore`] exactly
//! once.  Repaired fields are no longer unset and excluded segments are not
//! retried, so a second run over the same table writes nothing.
//!
//! Failures are per segment: a snap miss or a store error is recorded in the
//! [`RepairReport`] and the pass continues.

use std::fmt;

use wp_core::EdgeId;

use crate::network::{RoadSegment, collect_vertices};
use crate::{SpatialError, SpatialResult, VertexLocator};

// ── TopologyStore ─────────────────────────────────────────────────────────────

/// Destination for repaired segments.
///
/// Implementations persist whatever they need from the segment (links,
/// costs, exclusion flag) so that the next start loads an already-repaired
/// table.
pub trait TopologyStore {
    fn persist(&mut self, segment: &RoadSegment) -> SpatialResult<()>;
}

/// Keeps persisted segments in memory, in write order.
#[derive(Default)]
pub struct MemoryTopologyStore {
    pub persisted: Vec<RoadSegment>,
}

impl MemoryTopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.persisted.len()
    }
}

impl TopologyStore for MemoryTopologyStore {
    fn persist(&mut self, segment: &RoadSegment) -> SpatialResult<()> {
        self.persisted.push(segment.clone());
        Ok(())
    }
}

/// Discards every write.  Used when repair runs purely in memory.
pub struct NullTopologyStore;

impl TopologyStore for NullTopologyStore {
    fn persist(&mut self, _segment: &RoadSegment) -> SpatialResult<()> {
        Ok(())
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

/// A problem with one segment.  Never aborts the pass.
#[derive(Clone, Debug, PartialEq)]
pub enum RepairIssue {
    /// No vertex within the snap limit.  `distance_m` is `None` when there
    /// were no vertices at all.
    VertexSnapFailed { edge: EdgeId, endpoint: Endpoint, distance_m: Option<f64> },
    /// Fewer than two coordinates, so there is no endpoint to snap.
    MissingGeometry { edge: EdgeId },
    StoreFailed { edge: EdgeId, message: String },
}

/// Outcome of a [`TopologyRepairer::repair`] pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepairReport {
    /// Segments with at least one unset endpoint when the pass started,
    /// including ones excluded by an earlier pass.
    pub unlinked_edges_found: usize,
    /// Segments left out of routing after the pass, ascending.
    pub edges_excluded: Vec<EdgeId>,
    pub links_repaired: usize,
    pub costs_repaired: usize,
    /// Segments modified in memory by this pass, whether or not the store
    /// accepted them.
    pub changed: usize,
    /// Segments handed to the store successfully.
    pub writes: usize,
    pub issues: Vec<RepairIssue>,
}

// ── TopologyRepairer ──────────────────────────────────────────────────────────

pub struct TopologyRepairer {
    max_snap_distance_m: f64,
}

impl TopologyRepairer {
    pub fn new(max_snap_distance_m: f64) -> Self {
        Self { max_snap_distance_m }
    }

    /// Link and cost every segment that can be repaired.
    pub fn repair<S: TopologyStore + ?Sized>(
        &self,
        segments: &mut [RoadSegment],
        store: &mut S,
    ) -> RepairReport {
        let mut report = RepairReport {
            unlinked_edges_found: segments.iter().filter(|s| !s.is_linked()).count(),
            ..RepairReport::default()
        };

        let locator = VertexLocator::new(collect_vertices(segments.iter()), self.max_snap_distance_m);

        for seg in segments.iter_mut() {
            if seg.excluded {
                report.edges_excluded.push(seg.id);
                continue;
            }

            let mut changed = false;
            if !seg.is_linked() {
                changed |= self.link(seg, &locator, &mut report);
            }
            if !seg.excluded && !seg.is_costed() {
                let (fwd, rev) = seg.default_costs();
                seg.cost.get_or_insert(fwd);
                seg.reverse_cost.get_or_insert(rev);
                report.costs_repaired += 1;
                changed = true;
            }

            if seg.excluded {
                report.edges_excluded.push(seg.id);
            }
            if changed {
                report.changed += 1;
                match store.persist(seg) {
                    Ok(()) => report.writes += 1,
                    Err(e) => {
                        log::warn!("topology repair: could not persist edge {}: {e}", seg.id);
                        report.issues.push(RepairIssue::StoreFailed { edge: seg.id, message: e.to_string() });
                    }
                }
            }
        }

        report.edges_excluded.sort_unstable();
        if report.writes > 0 || !report.issues.is_empty() {
            log::info!(
                "topology repair: {} unlinked, {} links and {} costs repaired, {} excluded, {} writes",
                report.unlinked_edges_found,
                report.links_repaired,
                report.costs_repaired,
                report.edges_excluded.len(),
                report.writes,
            );
        } else {
            log::debug!("topology repair: nothing to do");
        }
        report
    }

    /// Snap the unset endpoints of `seg`.  Returns `true` if the segment
    /// changed (a link was set or it was excluded).
    fn link(&self, seg: &mut RoadSegment, locator: &VertexLocator, report: &mut RepairReport) -> bool {
        let (Some(start), Some(end)) = (seg.start(), seg.end()) else {
            return Self::exclude_without_geometry(seg, report);
        };
        if seg.geometry.len() < 2 {
            return Self::exclude_without_geometry(seg, report);
        }

        let mut changed = false;
        let mut linked_all = true;
        for (endpoint, position) in [(Endpoint::Source, start), (Endpoint::Target, end)] {
            let slot = match endpoint {
                Endpoint::Source => &mut seg.source,
                Endpoint::Target => &mut seg.target,
            };
            if slot.is_some() {
                continue;
            }
            match locator.try_snap(position) {
                Ok(v) => {
                    *slot = Some(v);
                    changed = true;
                }
                Err(e) => {
                    let distance_m = match &e {
                        SpatialError::VertexSnapFailed { distance_m, .. } => Some(*distance_m),
                        _ => None,
                    };
                    log::warn!("topology repair: edge {} {endpoint} not linked: {e}", seg.id);
                    report.issues.push(RepairIssue::VertexSnapFailed { edge: seg.id, endpoint, distance_m });
                    linked_all = false;
                }
            }
        }

        if linked_all {
            report.links_repaired += 1;
        } else {
            seg.excluded = true;
            changed = true;
        }
        changed
    }

    fn exclude_without_geometry(seg: &mut RoadSegment, report: &mut RepairReport) -> bool {
        log::warn!("topology repair: edge {} has fewer than two coordinates, excluding", seg.id);
        report.issues.push(RepairIssue::MissingGeometry { edge: seg.id });
        seg.excluded = true;
        true
    }
}
